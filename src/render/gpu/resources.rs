use super::draw_list::DrawList;
use super::pipelines::Layouts;
use crate::scene::geometry::{Geometry, GeometryId};
use crate::scene::texture::{
    ColorSpace, FilterMode, TextureData, TextureId, TextureKind, TextureSettings, TextureStore,
    WrapMode,
};
use crate::scene::Scene;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Interleaves geometry attributes; missing normals or uvs are zero-filled.
pub fn interleave(geometry: &Geometry) -> Vec<MeshVertex> {
    geometry
        .positions
        .iter()
        .enumerate()
        .map(|(index, position)| MeshVertex {
            position: *position,
            normal: geometry.normals.get(index).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: geometry.uvs.get(index).copied().unwrap_or([0.0, 0.0]),
        })
        .collect()
}

pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

/// GPU copies of scene geometry. Geometry is immutable once added, so each
/// id is uploaded the first time a draw references it.
#[derive(Default)]
pub struct MeshCache {
    meshes: HashMap<GeometryId, GpuMesh>,
}

impl MeshCache {
    pub fn prepare(&mut self, device: &wgpu::Device, scene: &Scene, draws: &DrawList) -> usize {
        let mut uploaded = 0;
        for draw in &draws.meshes {
            if self.meshes.contains_key(&draw.geometry) {
                continue;
            }
            let Some(geometry) = scene.geometry(draw.geometry) else {
                continue;
            };
            let vertices = interleave(geometry);
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_indices"),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            self.meshes.insert(
                draw.geometry,
                GpuMesh {
                    vertex_buffer,
                    index_buffer,
                    index_count: geometry.index_count(),
                },
            );
            uploaded += 1;
        }
        if uploaded > 0 {
            log::debug!("uploaded {uploaded} meshes ({} cached)", self.meshes.len());
        }
        uploaded
    }

    pub fn get(&self, id: GeometryId) -> Option<&GpuMesh> {
        self.meshes.get(&id)
    }
}

pub fn texture_format(color_space: ColorSpace) -> wgpu::TextureFormat {
    match color_space {
        ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

fn filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

pub fn sampler_descriptor(settings: &TextureSettings, mip_count: u32) -> wgpu::SamplerDescriptor<'static> {
    let address_mode = match settings.wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    };
    wgpu::SamplerDescriptor {
        label: Some("material_sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter(settings.mag_filter),
        min_filter: filter(settings.min_filter),
        mipmap_filter: if mip_count > 1 {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        },
        ..Default::default()
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    data: &TextureData,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: data.layer_count,
        },
        mip_level_count: data.mip_levels.len().max(1) as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (level, pixels) in data.mip_levels.iter().enumerate() {
        let (width, height) = data.mip_size(level);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: data.layer_count,
            },
        );
    }
    texture
}

struct GpuTexture {
    revision: u64,
    kind: TextureKind,
    bind_group: wgpu::BindGroup,
}

/// Texture slots mirrored to the GPU, refreshed when a slot's revision moves.
pub struct TextureCache {
    textures: HashMap<TextureId, GpuTexture>,
    fallback: wgpu::BindGroup,
}

impl TextureCache {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layouts: &Layouts) -> Self {
        let white = TextureData::solid([255, 255, 255, 255]);
        let texture = upload_texture(
            device,
            queue,
            "white_fallback",
            &white,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        let fallback = material_bind_group(
            device,
            layouts,
            &texture,
            &TextureSettings::default(),
            TextureKind::Flat,
            1,
        );
        Self {
            textures: HashMap::new(),
            fallback,
        }
    }

    /// Uploads ready slots that are new or changed. Returns how many were uploaded.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &Layouts,
        store: &TextureStore,
    ) -> usize {
        let mut uploaded = 0;
        for (id, slot) in store.iter() {
            let Some(data) = &slot.data else {
                continue;
            };
            if self
                .textures
                .get(&id)
                .is_some_and(|cached| cached.revision == slot.revision)
            {
                continue;
            }
            let texture = upload_texture(
                device,
                queue,
                &slot.label,
                data,
                texture_format(slot.settings.color_space),
            );
            let mip_count = data.mip_levels.len() as u32;
            let bind_group =
                material_bind_group(device, layouts, &texture, &slot.settings, slot.kind, mip_count);
            log::debug!(
                "uploaded texture '{}' ({}x{}, {} mips)",
                slot.label,
                data.width,
                data.height,
                mip_count
            );
            self.textures.insert(
                id,
                GpuTexture {
                    revision: slot.revision,
                    kind: slot.kind,
                    bind_group,
                },
            );
            uploaded += 1;
        }
        uploaded
    }

    /// Bind group for a flat material map, or plain white while it is missing.
    pub fn material(&self, id: Option<TextureId>) -> &wgpu::BindGroup {
        id.and_then(|id| self.textures.get(&id))
            .filter(|texture| texture.kind == TextureKind::Flat)
            .map(|texture| &texture.bind_group)
            .unwrap_or(&self.fallback)
    }

    pub fn cube(&self, id: TextureId) -> Option<&wgpu::BindGroup> {
        self.textures
            .get(&id)
            .filter(|texture| texture.kind == TextureKind::Cube)
            .map(|texture| &texture.bind_group)
    }
}

fn material_bind_group(
    device: &wgpu::Device,
    layouts: &Layouts,
    texture: &wgpu::Texture,
    settings: &TextureSettings,
    kind: TextureKind,
    mip_count: u32,
) -> wgpu::BindGroup {
    let (layout, dimension) = match kind {
        TextureKind::Flat => (&layouts.material, wgpu::TextureViewDimension::D2),
        TextureKind::Cube => (&layouts.cube, wgpu::TextureViewDimension::Cube),
    };
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(dimension),
        ..Default::default()
    });
    let sampler = device.create_sampler(&sampler_descriptor(settings, mip_count));
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("material_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    })
}

/// Buffer rewritten every frame that doubles its capacity when outgrown.
pub struct DynamicBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: wgpu::Buffer,
    capacity: u64,
}

impl DynamicBuffer {
    pub fn new(device: &wgpu::Device, label: &'static str, usage: wgpu::BufferUsages, capacity: u64) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let capacity = capacity.max(wgpu::COPY_BUFFER_ALIGNMENT);
        Self {
            label,
            usage,
            buffer: Self::allocate(device, label, usage, capacity),
            capacity,
        }
    }

    fn allocate(device: &wgpu::Device, label: &str, usage: wgpu::BufferUsages, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Writes `bytes` from offset zero. Returns true when the buffer was reallocated.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) -> bool {
        let mut grown = false;
        let needed = (bytes.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            self.buffer = Self::allocate(device, self.label, self.usage, self.capacity);
            grown = true;
        }
        if !bytes.is_empty() {
            if bytes.len() as u64 == needed {
                queue.write_buffer(&self.buffer, 0, bytes);
            } else {
                let mut padded = bytes.to_vec();
                padded.resize(needed as usize, 0);
                queue.write_buffer(&self.buffer, 0, &padded);
            }
        }
        grown
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::{interleave, sampler_descriptor, texture_format};
    use crate::scene::geometry::{box_geometry, Geometry};
    use crate::scene::texture::{ColorSpace, FilterMode, TextureSettings, WrapMode};

    #[test]
    fn interleave_keeps_attribute_order() {
        let geometry = box_geometry(2.0, 2.0, 2.0);
        let vertices = interleave(&geometry);
        assert_eq!(vertices.len(), geometry.vertex_count());
        assert_eq!(vertices[5].position, geometry.positions[5]);
        assert_eq!(vertices[5].normal, geometry.normals[5]);
        assert_eq!(vertices[5].uv, geometry.uvs[5]);
    }

    #[test]
    fn interleave_fills_missing_attributes() {
        let geometry = Geometry {
            positions: vec![[1.0, 2.0, 3.0]],
            ..Geometry::default()
        };
        let vertices = interleave(&geometry);
        assert_eq!(vertices[0].uv, [0.0, 0.0]);
        assert_eq!(vertices[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn sampler_follows_texture_settings() {
        let settings = TextureSettings {
            wrap: WrapMode::Repeat,
            mag_filter: FilterMode::Nearest,
            ..TextureSettings::srgb()
        };
        let descriptor = sampler_descriptor(&settings, 8);
        assert_eq!(descriptor.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(descriptor.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(descriptor.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(descriptor.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(
            texture_format(ColorSpace::Srgb),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(
            texture_format(ColorSpace::Linear),
            wgpu::TextureFormat::Rgba8Unorm
        );
    }
}
