use super::AssetError;
use crate::scene::texture::TextureData;
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::Path;

pub fn read_file(path: &Path) -> Result<Vec<u8>, AssetError> {
    std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.display().to_string(),
        source,
    })
}

pub fn decode_rgba(bytes: &[u8], label: &str) -> Result<RgbaImage, AssetError> {
    let image = image::load_from_memory(bytes).map_err(|source| AssetError::Decode {
        path: label.to_string(),
        source,
    })?;
    Ok(image.to_rgba8())
}

pub fn texture_from_file(path: &Path, generate_mipmaps: bool) -> Result<TextureData, AssetError> {
    let bytes = read_file(path)?;
    let image = decode_rgba(&bytes, &path.display().to_string())?;
    Ok(texture_from_image(image, generate_mipmaps))
}

pub fn texture_from_image(image: RgbaImage, generate_mipmaps: bool) -> TextureData {
    let (width, height) = image.dimensions();
    let mut levels = vec![image.as_raw().clone()];
    if generate_mipmaps {
        let mut current = image;
        for level in 1..mip_count(width, height) {
            let level_width = (width >> level).max(1);
            let level_height = (height >> level).max(1);
            current = image::imageops::resize(&current, level_width, level_height, FilterType::Triangle);
            levels.push(current.as_raw().clone());
        }
    }
    TextureData {
        width,
        height,
        layer_count: 1,
        mip_levels: levels,
    }
}

/// Loads six equally sized faces in +X, -X, +Y, -Y, +Z, -Z order into one cube texture.
pub fn cube_from_files(paths: &[impl AsRef<Path>; 6]) -> Result<TextureData, AssetError> {
    let mut size = None;
    let mut pixels = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        let face = decode_rgba(&bytes, &path.display().to_string())?;
        let dimensions = face.dimensions();
        match size {
            None => size = Some(dimensions),
            Some(expected) if expected != dimensions => {
                return Err(AssetError::CubeFaceSize {
                    path: path.display().to_string(),
                    expected,
                    found: dimensions,
                });
            }
            Some(_) => {}
        }
        pixels.extend_from_slice(face.as_raw());
    }
    let (width, height) = size.unwrap_or((1, 1));
    Ok(TextureData {
        width,
        height,
        layer_count: 6,
        mip_levels: vec![pixels],
    })
}

pub fn mip_count(width: u32, height: u32) -> usize {
    (32 - width.max(height).max(1).leading_zeros()) as usize
}
