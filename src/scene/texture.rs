use glam::Vec2;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// How texel values are interpreted when sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Values are used as-is.
    #[default]
    Linear,
    /// Values are sRGB-encoded and decoded to linear on sampling.
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureKind {
    #[default]
    Flat,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSettings {
    pub wrap: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub color_space: ColorSpace,
    pub repeat: Vec2,
    pub generate_mipmaps: bool,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            wrap: WrapMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            color_space: ColorSpace::Linear,
            repeat: Vec2::ONE,
            generate_mipmaps: true,
        }
    }
}

impl TextureSettings {
    pub fn srgb() -> Self {
        Self {
            color_space: ColorSpace::Srgb,
            ..Self::default()
        }
    }
}

/// Decoded RGBA8 pixels. Each entry of `mip_levels` holds every layer of
/// that level back to back (one layer for flat textures, six for cubes).
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub layer_count: u32,
    pub mip_levels: Vec<Vec<u8>>,
}

impl TextureData {
    pub fn mip_size(&self, level: usize) -> (u32, u32) {
        let width = (self.width >> level).max(1);
        let height = (self.height >> level).max(1);
        (width, height)
    }

    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            layer_count: 1,
            mip_levels: vec![rgba.to_vec()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureSlot {
    pub label: String,
    pub kind: TextureKind,
    pub settings: TextureSettings,
    pub data: Option<Arc<TextureData>>,
    /// Bumped whenever `data` or `settings` change so GPU copies can be refreshed.
    pub revision: u64,
}

impl TextureSlot {
    pub fn is_ready(&self) -> bool {
        self.data.is_some()
    }
}

#[derive(Debug, Default)]
pub struct TextureStore {
    slots: Vec<TextureSlot>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn reserve(&mut self, label: &str, kind: TextureKind, settings: TextureSettings) -> TextureId {
        self.slots.push(TextureSlot {
            label: label.to_string(),
            kind,
            settings,
            data: None,
            revision: 0,
        });
        TextureId(self.slots.len() - 1)
    }

    pub fn insert_ready(
        &mut self,
        label: &str,
        kind: TextureKind,
        settings: TextureSettings,
        data: TextureData,
    ) -> TextureId {
        let id = self.reserve(label, kind, settings);
        self.fill(id, data);
        id
    }

    pub fn fill(&mut self, id: TextureId, data: TextureData) -> bool {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return false;
        };
        slot.data = Some(Arc::new(data));
        slot.revision += 1;
        true
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureSlot> {
        self.slots.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &TextureSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| (TextureId(index), slot))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{TextureData, TextureKind, TextureSettings, TextureStore};

    #[test]
    fn reserved_slot_fills_later_and_bumps_revision() {
        let mut store = TextureStore::new();
        let id = store.reserve("grass", TextureKind::Flat, TextureSettings::srgb());
        assert!(!store.get(id).unwrap().is_ready());

        assert!(store.fill(id, TextureData::solid([10, 20, 30, 255])));
        let slot = store.get(id).unwrap();
        assert!(slot.is_ready());
        assert_eq!(slot.revision, 1);
    }

    #[test]
    fn mip_size_never_reaches_zero() {
        let data = TextureData {
            width: 8,
            height: 2,
            layer_count: 1,
            mip_levels: Vec::new(),
        };
        assert_eq!(data.mip_size(0), (8, 2));
        assert_eq!(data.mip_size(2), (2, 1));
        assert_eq!(data.mip_size(5), (1, 1));
    }
}
