use super::material::Color;
use super::NodeId;
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    pub map_size: u32,
    pub bias: f32,
    /// Half extent of the orthographic shadow camera.
    pub extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 512,
            bias: 0.0,
            extent: 5.0,
            near: 0.5,
            far: 500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub cast_shadow: bool,
    pub shadow: ShadowSettings,
}

impl DirectionalLight {
    /// Unit vector pointing from the lit surface towards the light.
    pub fn direction_to_light(&self) -> Vec3 {
        (self.position - self.target).normalize_or(Vec3::Y)
    }
}

/// Where a spot light aims.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpotTarget {
    Point(Vec3),
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    pub target: SpotTarget,
    /// Outer cone half angle in radians.
    pub angle: f32,
    /// Fraction of the cone that fades out, 0..1.
    pub penumbra: f32,
    pub decay: f32,
    /// Cut-off distance; zero means unbounded.
    pub distance: f32,
    pub cast_shadow: bool,
}

impl SpotLight {
    pub fn new(color: Color, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            position: Vec3::Y,
            target: SpotTarget::Point(Vec3::ZERO),
            angle: std::f32::consts::FRAC_PI_3,
            penumbra: 0.0,
            decay: 2.0,
            distance: 0.0,
            cast_shadow: false,
        }
    }

    /// `(cos outer, cos inner)` for smoothstep cone attenuation.
    pub fn cone_cosines(&self) -> (f32, f32) {
        let outer = self.angle.cos();
        let inner = (self.angle * (1.0 - self.penumbra)).cos();
        (outer, inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient(AmbientLight),
    Directional(DirectionalLight),
    Spot(SpotLight),
}
