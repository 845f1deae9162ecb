//! wgpu forward renderer behind [`RenderBackend`].
//!
//! A frame is a shadow pass for the directional light, then one scene pass
//! (sky, meshes, helper lines) into an optionally multisampled target that
//! resolves to the surface, then the egui overlay on top.

mod draw_list;
mod pipelines;
mod resources;
mod uniforms;

use super::{PerspectiveCamera, RenderBackend, RenderError, Viewport};
use crate::app::egui_host::EguiFrameOutput;
use crate::config::RendererConfig;
use crate::scene::{Background, Scene};
use draw_list::DrawList;
use pipelines::{Layouts, Pipelines, DEPTH_FORMAT};
use resources::{DynamicBuffer, MeshCache, TextureCache};
use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Instant;
use uniforms::{pack_objects, FrameUniforms, ObjectUniforms, SceneLights, ShadowUniforms, OBJECT_STRIDE};
use winit::window::Window;

struct FrameTargets {
    /// Multisampled color target; `None` renders straight into the surface.
    msaa: Option<wgpu::TextureView>,
    depth: wgpu::TextureView,
}

impl FrameTargets {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let msaa = (sample_count > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("msaa_color"),
                    size,
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });
        let depth = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("depth"),
                size,
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());
        Self { msaa, depth }
    }
}

struct ShadowMap {
    size: u32,
    view: wgpu::TextureView,
}

impl ShadowMap {
    fn new(device: &wgpu::Device, size: u32) -> Self {
        let size = size.max(1);
        let view = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("shadow_map"),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());
        Self { size, view }
    }
}

/// Converts a bottom-left rectangle to a top-left one clipped to the surface.
/// Returns `None` when nothing of it is left.
fn to_top_left(rect: Viewport, surface: (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let (surface_width, surface_height) = surface;
    let x = rect.x.min(surface_width);
    let bottom = rect.y.min(surface_height);
    let width = rect.width.min(surface_width - x);
    let height = rect.height.min(surface_height - bottom);
    if width == 0 || height == 0 {
        return None;
    }
    Some((x, surface_height - bottom - height, width, height))
}

fn clear_color(background: &Background) -> wgpu::Color {
    let color = match background {
        Background::Color(color) => color,
        Background::CubeTexture { fallback, .. } => fallback,
    };
    wgpu::Color {
        r: color.0.x as f64,
        g: color.0.y as f64,
        b: color.0.z as f64,
        a: 1.0,
    }
}

pub struct RenderContext {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    /// sRGB view of the surface format that every pass renders into.
    target_format: wgpu::TextureFormat,
    sample_count: u32,
    targets: FrameTargets,
    layouts: Layouts,
    pipelines: Pipelines,
    frame_buffer: wgpu::Buffer,
    shadow_buffer: wgpu::Buffer,
    shadow_map: ShadowMap,
    shadow_sampler: wgpu::Sampler,
    frame_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
    objects: DynamicBuffer,
    object_bind_group: wgpu::BindGroup,
    line_vertices: DynamicBuffer,
    textures: TextureCache,
    meshes: MeshCache,
    egui_renderer: egui_wgpu::Renderer,
    overlay: Option<EguiFrameOutput>,
    scissor_test: bool,
    scissor: Viewport,
    viewport: Viewport,
    render_ms: f32,
}

impl RenderContext {
    pub fn new(window: Arc<Window>, renderer: &RendererConfig) -> Result<Self, RenderError> {
        pollster::block_on(Self::new_async(window, renderer))
    }

    async fn new_async(window: Arc<Window>, renderer: &RendererConfig) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterUnavailable)?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("twinview_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first())
            .copied()
            .ok_or(RenderError::NoSurfaceFormat)?;
        let target_format = format.add_srgb_suffix();
        let alpha_mode = capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: if target_format == format {
                vec![]
            } else {
                vec![target_format]
            },
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("surface configured: {width}x{height} {format:?}");

        let sample_count = renderer.sample_count();
        let layouts = Layouts::new(&device);
        let pipelines = Pipelines::new(&device, &layouts, target_format, sample_count);
        let targets = FrameTargets::new(&device, target_format, width, height, sample_count);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadow_uniforms"),
            size: std::mem::size_of::<ShadowUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_map = ShadowMap::new(&device, renderer.shadow_map_size);
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let frame_bind_group =
            frame_bind_group(&device, &layouts, &frame_buffer, &shadow_map, &shadow_sampler);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_bind_group"),
            layout: &layouts.shadow,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: shadow_buffer.as_entire_binding(),
            }],
        });
        let objects = DynamicBuffer::new(
            &device,
            "object_uniforms",
            wgpu::BufferUsages::UNIFORM,
            OBJECT_STRIDE * 64,
        );
        let object_bind_group = object_bind_group(&device, &layouts, &objects);
        let line_vertices = DynamicBuffer::new(&device, "line_vertices", wgpu::BufferUsages::VERTEX, 4096);
        let textures = TextureCache::new(&device, &queue, &layouts);
        let egui_renderer = egui_wgpu::Renderer::new(&device, target_format, None, 1, false);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            target_format,
            sample_count,
            targets,
            layouts,
            pipelines,
            frame_buffer,
            shadow_buffer,
            shadow_map,
            shadow_sampler,
            frame_bind_group,
            shadow_bind_group,
            objects,
            object_bind_group,
            line_vertices,
            textures,
            meshes: MeshCache::default(),
            egui_renderer,
            overlay: None,
            scissor_test: false,
            scissor: Viewport::full(width, height),
            viewport: Viewport::full(width, height),
            render_ms: 0.0,
        })
    }

    /// Queues egui output to be painted over the next frame.
    pub fn set_overlay(&mut self, overlay: EguiFrameOutput) {
        self.overlay = Some(overlay);
    }

    pub fn max_texture_side(&self) -> usize {
        self.device.limits().max_texture_dimension_2d as usize
    }

    /// CPU time spent encoding and submitting the last frame.
    pub fn render_ms(&self) -> f32 {
        self.render_ms
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        self.targets = FrameTargets::new(
            &self.device,
            self.target_format,
            self.config.width,
            self.config.height,
            self.sample_count,
        );
    }

    fn ensure_shadow_map(&mut self, size: u32) {
        if self.shadow_map.size == size.max(1) {
            return;
        }
        log::debug!("shadow map resized to {size}x{size}");
        self.shadow_map = ShadowMap::new(&self.device, size);
        self.frame_bind_group = frame_bind_group(
            &self.device,
            &self.layouts,
            &self.frame_buffer,
            &self.shadow_map,
            &self.shadow_sampler,
        );
    }

    fn upload_draws(&mut self, draws: &DrawList) {
        if self
            .objects
            .write(&self.device, &self.queue, &pack_objects(&draws.objects))
        {
            self.object_bind_group = object_bind_group(&self.device, &self.layouts, &self.objects);
        }
        self.line_vertices.write(
            &self.device,
            &self.queue,
            bytemuck::cast_slice(&draws.line_vertices),
        );
    }

    fn encode_shadow_pass(&self, encoder: &mut wgpu::CommandEncoder, draws: &DrawList) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shadow_pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow_map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_bind_group(0, &self.shadow_bind_group, &[]);
        for draw in draws.shadow_casters() {
            let Some(mesh) = self.meshes.get(draw.geometry) else {
                continue;
            };
            pass.set_pipeline(self.pipelines.shadow(draw.double_sided));
            pass.set_bind_group(1, &self.object_bind_group, &[draw.object * OBJECT_STRIDE as u32]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            let indices = draw.indices.clone().unwrap_or(0..mesh.index_count);
            pass.draw_indexed(indices, 0, 0..1);
        }
    }

    fn encode_scene_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        scene: &Scene,
        draws: &DrawList,
    ) {
        let (view, resolve_target, store) = match &self.targets.msaa {
            Some(msaa) => (msaa, Some(surface_view), wgpu::StoreOp::Discard),
            None => (surface_view, None, wgpu::StoreOp::Store),
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color(&scene.background)),
                    store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let surface = (self.config.width, self.config.height);
        let Some((x, y, width, height)) = to_top_left(self.viewport, surface) else {
            return;
        };
        pass.set_viewport(x as f32, y as f32, width as f32, height as f32, 0.0, 1.0);
        let scissor = if self.scissor_test {
            to_top_left(self.scissor, surface)
        } else {
            to_top_left(Viewport::full(surface.0, surface.1), surface)
        };
        let Some((x, y, width, height)) = scissor else {
            return;
        };
        pass.set_scissor_rect(x, y, width, height);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        if let Background::CubeTexture { texture, .. } = scene.background {
            if let Some(cube) = self.textures.cube(texture) {
                pass.set_pipeline(&self.pipelines.sky);
                pass.set_bind_group(1, cube, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        for draw in &draws.meshes {
            let Some(mesh) = self.meshes.get(draw.geometry) else {
                continue;
            };
            pass.set_pipeline(self.pipelines.mesh(draw.double_sided));
            pass.set_bind_group(1, &self.object_bind_group, &[draw.object * OBJECT_STRIDE as u32]);
            pass.set_bind_group(2, self.textures.material(draw.map), &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            let indices = draw.indices.clone().unwrap_or(0..mesh.index_count);
            pass.draw_indexed(indices, 0, 0..1);
        }

        if !draws.lines.is_empty() {
            pass.set_pipeline(&self.pipelines.lines);
            pass.set_vertex_buffer(0, self.line_vertices.buffer().slice(..));
            for draw in &draws.lines {
                pass.set_bind_group(1, &self.object_bind_group, &[draw.object * OBJECT_STRIDE as u32]);
                pass.draw(draw.vertices.clone(), 0..1);
            }
        }
    }

    /// Paints the pending egui overlay onto the resolved surface view.
    fn encode_overlay(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
    ) -> Vec<wgpu::CommandBuffer> {
        let Some(overlay) = self.overlay.take() else {
            return Vec::new();
        };
        for (id, image_delta) in &overlay.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: overlay.pixels_per_point,
        };
        let commands = self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &overlay.clipped_primitives,
            &screen,
        );
        {
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let mut pass = pass.forget_lifetime();
            self.egui_renderer
                .render(&mut pass, &overlay.clipped_primitives, &screen);
        }
        for id in &overlay.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
        commands
    }
}

fn frame_bind_group(
    device: &wgpu::Device,
    layouts: &Layouts,
    frame_buffer: &wgpu::Buffer,
    shadow_map: &ShadowMap,
    shadow_sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("frame_bind_group"),
        layout: &layouts.frame,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&shadow_map.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(shadow_sampler),
            },
        ],
    })
}

fn object_bind_group(device: &wgpu::Device, layouts: &Layouts, objects: &DynamicBuffer) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("object_bind_group"),
        layout: &layouts.object,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: objects.buffer(),
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<ObjectUniforms>() as u64),
            }),
        }],
    })
}

impl RenderBackend for RenderContext {
    fn drawable_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
        log::debug!("surface resized to {width}x{height}");
    }

    fn set_scissor_test(&mut self, enabled: bool) {
        self.scissor_test = enabled;
    }

    fn set_scissor(&mut self, rect: Viewport) {
        self.scissor = rect;
    }

    fn set_viewport(&mut self, rect: Viewport) {
        self.viewport = rect;
    }

    fn render_frame(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError> {
        let start = Instant::now();
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated; reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out acquiring surface texture; skipping frame");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        let surface_view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.target_format),
            ..Default::default()
        });

        self.textures
            .sync(&self.device, &self.queue, &self.layouts, &scene.textures);
        let draws = DrawList::collect(scene);
        self.meshes.prepare(&self.device, scene, &draws);
        self.upload_draws(&draws);

        let lights = SceneLights::gather(scene);
        let shadow = lights.shadow();
        if let Some(settings) = &shadow {
            self.ensure_shadow_map(settings.map_size);
        }
        let frame_uniforms = FrameUniforms::new(scene, camera, &lights);
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame_uniforms));
        let shadow_uniforms = ShadowUniforms {
            light_view_proj: frame_uniforms.light_view_proj,
        };
        self.queue
            .write_buffer(&self.shadow_buffer, 0, bytemuck::bytes_of(&shadow_uniforms));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        if shadow.is_some() {
            self.encode_shadow_pass(&mut encoder, &draws);
        }
        self.encode_scene_pass(&mut encoder, &surface_view, scene, &draws);
        let overlay_commands = self.encode_overlay(&mut encoder, &surface_view);

        self.queue
            .submit(overlay_commands.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();
        self.render_ms = start.elapsed().as_secs_f32() * 1000.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{clear_color, to_top_left};
    use crate::render::Viewport;
    use crate::scene::material::Color;
    use crate::scene::texture::TextureId;
    use crate::scene::Background;

    #[test]
    fn bottom_left_rect_flips_to_top_left() {
        let rect = Viewport {
            x: 10,
            y: 20,
            width: 100,
            height: 50,
        };
        assert_eq!(to_top_left(rect, (800, 600)), Some((10, 530, 100, 50)));
        assert_eq!(
            to_top_left(Viewport::full(800, 600), (800, 600)),
            Some((0, 0, 800, 600))
        );
    }

    #[test]
    fn rect_is_clipped_to_surface() {
        let rect = Viewport {
            x: 700,
            y: 0,
            width: 400,
            height: 900,
        };
        assert_eq!(to_top_left(rect, (800, 600)), Some((700, 0, 100, 600)));
        assert_eq!(to_top_left(Viewport::full(0, 0), (800, 600)), None);
        let outside = Viewport {
            x: 900,
            y: 0,
            width: 10,
            height: 10,
        };
        assert_eq!(to_top_left(outside, (800, 600)), None);
    }

    #[test]
    fn clear_uses_fallback_until_sky_is_drawn() {
        let sky = Color::from_hex(0x87CEEB);
        let background = Background::CubeTexture {
            texture: TextureId(0),
            fallback: sky,
        };
        let clear = clear_color(&background);
        assert!((clear.r - sky.0.x as f64).abs() < 1e-6);
        assert_eq!(clear.a, 1.0);
    }
}
