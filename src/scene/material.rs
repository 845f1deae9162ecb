use super::texture::TextureId;
use glam::Vec3;

/// Linear RGB color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color(pub Vec3);

impl Color {
    pub const WHITE: Color = Color(Vec3::ONE);
    pub const BLACK: Color = Color(Vec3::ZERO);

    /// Builds a color from a `0xRRGGBB` value in sRGB, as CSS colors are written.
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
        let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
        let b = (hex & 0xFF) as f32 / 255.0;
        Color(Vec3::new(
            srgb_to_linear(r),
            srgb_to_linear(g),
            srgb_to_linear(b),
        ))
    }

    pub fn to_array(self) -> [f32; 3] {
        self.0.to_array()
    }
}

pub mod css {
    pub const SKY_BLUE: u32 = 0x87CEEB;
    pub const LIGHT_BLUE: u32 = 0xADD8E6;
}

fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Front,
    Double,
}

/// Lit surface description used by every mesh in the demo.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Color,
    pub map: Option<TextureId>,
    pub side: Side,
}

impl Material {
    pub fn colored(color: Color) -> Self {
        Self {
            color,
            map: None,
            side: Side::Front,
        }
    }

    pub fn textured(map: TextureId) -> Self {
        Self {
            color: Color::WHITE,
            map: Some(map),
            side: Side::Front,
        }
    }

    pub fn double_sided(mut self) -> Self {
        self.side = Side::Double;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::colored(Color::WHITE)
    }
}
