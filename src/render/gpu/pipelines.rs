use super::resources::MeshVertex;
use super::uniforms::{FrameUniforms, ObjectUniforms, ShadowUniforms};
use crate::scene::LineVertex;
use std::num::NonZeroU64;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const SCENE_SHADER: &str = concat!(
    include_str!("../shaders/frame.wgsl"),
    include_str!("../shaders/object.wgsl"),
    include_str!("../shaders/scene.wgsl"),
);
const LINES_SHADER: &str = concat!(
    include_str!("../shaders/frame.wgsl"),
    include_str!("../shaders/object.wgsl"),
    include_str!("../shaders/lines.wgsl"),
);
const SKY_SHADER: &str = concat!(
    include_str!("../shaders/frame.wgsl"),
    include_str!("../shaders/sky.wgsl"),
);
const SHADOW_SHADER: &str = concat!(
    include_str!("../shaders/object.wgsl"),
    include_str!("../shaders/shadow.wgsl"),
);

fn uniform_entry(binding: u32, size: usize, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32, ty: wgpu::SamplerBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(ty),
        count: None,
    }
}

/// Bind group layouts shared by every pipeline.
pub struct Layouts {
    /// Frame uniforms, shadow map and its comparison sampler.
    pub frame: wgpu::BindGroupLayout,
    /// Per-draw uniforms addressed with a dynamic offset.
    pub object: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
    pub cube: wgpu::BindGroupLayout,
    pub shadow: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_layout"),
            entries: &[
                uniform_entry(0, std::mem::size_of::<FrameUniforms>(), false),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                sampler_entry(2, wgpu::SamplerBindingType::Comparison),
            ],
        });
        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object_layout"),
            entries: &[uniform_entry(0, std::mem::size_of::<ObjectUniforms>(), true)],
        });
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                sampler_entry(1, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let cube = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cube_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube),
                sampler_entry(1, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let shadow = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_layout"),
            entries: &[uniform_entry(0, std::mem::size_of::<ShadowUniforms>(), false)],
        });
        Self {
            frame,
            object,
            material,
            cube,
            shadow,
        }
    }
}

pub struct Pipelines {
    pub mesh_front: wgpu::RenderPipeline,
    pub mesh_double: wgpu::RenderPipeline,
    pub shadow_front: wgpu::RenderPipeline,
    pub shadow_double: wgpu::RenderPipeline,
    pub sky: wgpu::RenderPipeline,
    pub lines: wgpu::RenderPipeline,
}

struct ColorTarget {
    format: wgpu::TextureFormat,
    sample_count: u32,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let target = ColorTarget {
            format: color_format,
            sample_count,
        };
        let scene_module = shader(device, "scene_shader", SCENE_SHADER);
        let lines_module = shader(device, "lines_shader", LINES_SHADER);
        let sky_module = shader(device, "sky_shader", SKY_SHADER);
        let shadow_module = shader(device, "shadow_shader", SHADOW_SHADER);

        let mesh_layout = pipeline_layout(
            device,
            "mesh_pipeline_layout",
            &[&layouts.frame, &layouts.object, &layouts.material],
        );
        let lines_layout =
            pipeline_layout(device, "lines_pipeline_layout", &[&layouts.frame, &layouts.object]);
        let sky_layout =
            pipeline_layout(device, "sky_pipeline_layout", &[&layouts.frame, &layouts.cube]);
        let shadow_layout =
            pipeline_layout(device, "shadow_pipeline_layout", &[&layouts.shadow, &layouts.object]);

        let mesh = |label: &str, cull_mode: Option<wgpu::Face>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&mesh_layout),
                vertex: wgpu::VertexState {
                    module: &scene_module,
                    entry_point: Some("vs_main"),
                    buffers: &[MeshVertex::desc()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &scene_module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(target.state())],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: triangles(cull_mode),
                depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
                multisample: target.multisample(),
                multiview: None,
                cache: None,
            })
        };
        let mesh_front = mesh("mesh_pipeline", Some(wgpu::Face::Back));
        let mesh_double = mesh("mesh_double_sided_pipeline", None);

        // Front-facing casters render their back faces into the shadow map.
        let shadow = |label: &str, cull_mode: Option<wgpu::Face>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&shadow_layout),
                vertex: wgpu::VertexState {
                    module: &shadow_module,
                    entry_point: Some("vs_shadow"),
                    buffers: &[MeshVertex::desc()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: None,
                primitive: triangles(cull_mode),
                depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let shadow_front = shadow("shadow_pipeline", Some(wgpu::Face::Front));
        let shadow_double = shadow("shadow_double_sided_pipeline", None);

        // No vertex buffers: a fullscreen triangle from vertex_index, drawn at the far plane.
        let sky = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sky_pipeline"),
            layout: Some(&sky_layout),
            vertex: wgpu::VertexState {
                module: &sky_module,
                entry_point: Some("vs_sky"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &sky_module,
                entry_point: Some("fs_sky"),
                targets: &[Some(target.state())],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: triangles(None),
            depth_stencil: Some(depth_state(false, wgpu::CompareFunction::LessEqual)),
            multisample: target.multisample(),
            multiview: None,
            cache: None,
        });

        let line_attributes = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
        let lines = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lines_pipeline"),
            layout: Some(&lines_layout),
            vertex: wgpu::VertexState {
                module: &lines_module,
                entry_point: Some("vs_lines"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &line_attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &lines_module,
                entry_point: Some("fs_lines"),
                targets: &[Some(target.state())],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..triangles(None)
            },
            depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
            multisample: target.multisample(),
            multiview: None,
            cache: None,
        });

        Self {
            mesh_front,
            mesh_double,
            shadow_front,
            shadow_double,
            sky,
            lines,
        }
    }

    pub fn mesh(&self, double_sided: bool) -> &wgpu::RenderPipeline {
        if double_sided {
            &self.mesh_double
        } else {
            &self.mesh_front
        }
    }

    pub fn shadow(&self, double_sided: bool) -> &wgpu::RenderPipeline {
        if double_sided {
            &self.shadow_double
        } else {
            &self.shadow_front
        }
    }
}

impl ColorTarget {
    fn state(&self) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format: self.format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        }
    }

    fn multisample(&self) -> wgpu::MultisampleState {
        wgpu::MultisampleState {
            count: self.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        }
    }
}

fn shader(device: &wgpu::Device, label: &str, source: &'static str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn pipeline_layout(
    device: &wgpu::Device,
    label: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts,
        push_constant_ranges: &[],
    })
}

fn triangles(cull_mode: Option<wgpu::Face>) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

fn depth_state(write: bool, compare: wgpu::CompareFunction) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::{LINES_SHADER, SCENE_SHADER, SHADOW_SHADER, SKY_SHADER};

    #[test]
    fn shaders_declare_their_entry_points() {
        assert!(SCENE_SHADER.contains("fn vs_main") && SCENE_SHADER.contains("fn fs_main"));
        assert!(LINES_SHADER.contains("fn vs_lines") && LINES_SHADER.contains("fn fs_lines"));
        assert!(SKY_SHADER.contains("fn vs_sky") && SKY_SHADER.contains("fn fs_sky"));
        assert!(SHADOW_SHADER.contains("fn vs_shadow"));
        assert!(!SHADOW_SHADER.contains("struct Frame"));
    }
}
