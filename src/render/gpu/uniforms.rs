use crate::render::camera::PerspectiveCamera;
use crate::scene::light::{DirectionalLight, Light, ShadowSettings, SpotLight, SpotTarget};
use crate::scene::material::Material;
use crate::scene::Scene;
use glam::{Mat3, Mat4, Vec3};

/// Byte distance between consecutive entries of the dynamic object buffer.
pub const OBJECT_STRIDE: u64 = 256;

/// Per-frame camera, light and fog state. Mirrors `Frame` in `frame.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    /// Inverse of the rotation-only view projection, for sky directions.
    pub sky_inverse: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    /// w: 1 when a directional light is present.
    pub dir_color: [f32; 4],
    /// Unit vector towards the directional light.
    pub dir_direction: [f32; 4],
    /// x: enabled, y: depth bias, z: texel size.
    pub shadow: [f32; 4],
    /// w: 1 when a spot light is present.
    pub spot_color: [f32; 4],
    /// w: decay exponent.
    pub spot_position: [f32; 4],
    /// Cone axis pointing back towards the light; w: cut-off distance.
    pub spot_direction: [f32; 4],
    /// x: cos outer, y: cos inner.
    pub spot_cone: [f32; 4],
    /// w: 1 when fog is on.
    pub fog_color: [f32; 4],
    /// x: near, y: far.
    pub fog_range: [f32; 4],
}

/// Light-space transform for the shadow pass. Mirrors `ShadowGlobals` in `shadow.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniforms {
    pub light_view_proj: [[f32; 4]; 4],
}

/// Per-draw transform and material. Mirrors `Object` in `object.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// xy: repeat, zw: offset.
    pub uv_transform: [f32; 4],
    /// x: receives shadows.
    pub flags: [f32; 4],
}

impl ObjectUniforms {
    pub fn new(world: Mat4, material: &Material, repeat: [f32; 2], receive_shadow: bool) -> Self {
        let normal = if world.determinant().abs() > f32::EPSILON {
            world.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        let color = material.color.to_array();
        Self {
            model: world.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            color: [color[0], color[1], color[2], 1.0],
            uv_transform: [repeat[0], repeat[1], 0.0, 0.0],
            flags: [if receive_shadow { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }

    /// Unlit line geometry only needs the model matrix.
    pub fn lines(world: Mat4) -> Self {
        Self {
            model: world.to_cols_array_2d(),
            normal: Mat4::IDENTITY.to_cols_array_2d(),
            color: [1.0; 4],
            uv_transform: [1.0, 1.0, 0.0, 0.0],
            flags: [0.0; 4],
        }
    }
}

/// Packs objects at `OBJECT_STRIDE` intervals for one dynamic-offset buffer write.
pub fn pack_objects(objects: &[ObjectUniforms]) -> Vec<u8> {
    let stride = OBJECT_STRIDE as usize;
    let size = std::mem::size_of::<ObjectUniforms>();
    let mut bytes = vec![0u8; objects.len() * stride];
    for (index, object) in objects.iter().enumerate() {
        let start = index * stride;
        bytes[start..start + size].copy_from_slice(bytemuck::bytes_of(object));
    }
    bytes
}

/// The lights the forward pass shades with: ambient terms are summed, the
/// first directional and the first spot light are used.
#[derive(Debug, Clone, Copy)]
pub struct SceneLights {
    pub ambient: Vec3,
    pub directional: Option<DirectionalLight>,
    pub spot: Option<(SpotLight, Vec3)>,
}

impl SceneLights {
    pub fn gather(scene: &Scene) -> Self {
        let mut lights = Self {
            ambient: Vec3::ZERO,
            directional: None,
            spot: None,
        };
        for light in scene.lights() {
            match light {
                Light::Ambient(ambient) => lights.ambient += ambient.color.0 * ambient.intensity,
                Light::Directional(directional) => {
                    lights.directional.get_or_insert(*directional);
                }
                Light::Spot(spot) => {
                    if lights.spot.is_none() {
                        let target = match spot.target {
                            SpotTarget::Point(point) => point,
                            SpotTarget::Node(node) => {
                                scene.world_matrix(node).transform_point3(Vec3::ZERO)
                            }
                        };
                        lights.spot = Some((*spot, target));
                    }
                }
            }
        }
        lights
    }

    /// Shadow parameters when the directional light casts shadows.
    pub fn shadow(&self) -> Option<ShadowSettings> {
        self.directional
            .filter(|light| light.cast_shadow)
            .map(|light| light.shadow)
    }
}

/// Orthographic light camera looking from the light position at its target.
pub fn shadow_view_projection(light: &DirectionalLight) -> Mat4 {
    let direction = (light.target - light.position).normalize_or(Vec3::NEG_Y);
    let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(light.position, light.target, up);
    let shadow = &light.shadow;
    let projection = Mat4::orthographic_rh(
        -shadow.extent,
        shadow.extent,
        -shadow.extent,
        shadow.extent,
        shadow.near,
        shadow.far,
    );
    projection * view
}

impl FrameUniforms {
    pub fn new(scene: &Scene, camera: &PerspectiveCamera, lights: &SceneLights) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let rotation_only = Mat4::from_mat3(Mat3::from_mat4(view));
        let sky_inverse = (projection * rotation_only).inverse();

        let mut uniforms = Self {
            view_proj: (projection * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            light_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            sky_inverse: sky_inverse.to_cols_array_2d(),
            ambient: lights.ambient.extend(0.0).to_array(),
            dir_color: [0.0; 4],
            dir_direction: [0.0, 1.0, 0.0, 0.0],
            shadow: [0.0; 4],
            spot_color: [0.0; 4],
            spot_position: [0.0; 4],
            spot_direction: [0.0, 1.0, 0.0, 0.0],
            spot_cone: [0.0; 4],
            fog_color: [0.0; 4],
            fog_range: [0.0; 4],
        };

        if let Some(light) = &lights.directional {
            uniforms.dir_color = (light.color.0 * light.intensity).extend(1.0).to_array();
            uniforms.dir_direction = light.direction_to_light().extend(0.0).to_array();
            uniforms.light_view_proj = shadow_view_projection(light).to_cols_array_2d();
            if light.cast_shadow {
                let texel = 1.0 / light.shadow.map_size.max(1) as f32;
                uniforms.shadow = [1.0, light.shadow.bias, texel, 0.0];
            }
        }

        if let Some((spot, target)) = &lights.spot {
            let axis = (spot.position - *target).normalize_or(Vec3::Y);
            let (outer, inner) = spot.cone_cosines();
            uniforms.spot_color = (spot.color.0 * spot.intensity).extend(1.0).to_array();
            uniforms.spot_position = spot.position.extend(spot.decay).to_array();
            uniforms.spot_direction = axis.extend(spot.distance).to_array();
            // smoothstep needs distinct edges.
            uniforms.spot_cone = [outer, inner.max(outer + 1e-4), 0.0, 0.0];
        }

        if let Some(fog) = &scene.fog {
            uniforms.fog_color = fog.color.0.extend(1.0).to_array();
            uniforms.fog_range = [fog.near, fog.far, 0.0, 0.0];
        }

        uniforms
    }
}

#[cfg(test)]
mod tests {
    use super::{
        pack_objects, shadow_view_projection, FrameUniforms, ObjectUniforms, SceneLights,
        OBJECT_STRIDE,
    };
    use crate::config::CameraConfig;
    use crate::render::camera::PerspectiveCamera;
    use crate::scene::light::{
        AmbientLight, DirectionalLight, Light, ShadowSettings, SpotLight, SpotTarget,
    };
    use crate::scene::material::{Color, Material};
    use crate::scene::{Fog, Scene};
    use glam::{Mat4, Vec3};

    fn sun() -> DirectionalLight {
        DirectionalLight {
            color: Color::WHITE,
            intensity: 3.0,
            position: Vec3::new(-1.0, 2.0, 4.0),
            target: Vec3::ZERO,
            cast_shadow: true,
            shadow: ShadowSettings {
                bias: -0.005,
                ..ShadowSettings::default()
            },
        }
    }

    #[test]
    fn uniform_layouts_fit_wgsl_alignment() {
        assert_eq!(std::mem::size_of::<FrameUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<ObjectUniforms>() % 16, 0);
        assert!(std::mem::size_of::<ObjectUniforms>() as u64 <= OBJECT_STRIDE);
    }

    #[test]
    fn shadow_camera_centres_light_target() {
        let light = sun();
        let clip = shadow_view_projection(&light).project_point3(light.target);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn shadow_camera_handles_vertical_light() {
        let mut light = sun();
        light.position = Vec3::new(0.0, 10.0, 0.0);
        let matrix = shadow_view_projection(&light);
        assert!(matrix.is_finite());
    }

    #[test]
    fn lights_sum_ambient_and_resolve_spot_target_node() {
        let mut scene = Scene::new();
        let cube = scene.add_group("cube");
        scene.node_mut(cube).unwrap().transform.position = Vec3::new(0.0, 1.0, 2.2);
        scene.add_light(Light::Ambient(AmbientLight {
            color: Color::WHITE,
            intensity: 1.0,
        }));
        scene.add_light(Light::Ambient(AmbientLight {
            color: Color::WHITE,
            intensity: 0.5,
        }));
        let mut spot = SpotLight::new(Color::WHITE, 150.0);
        spot.target = SpotTarget::Node(cube);
        scene.add_light(Light::Spot(spot));
        scene.add_light(Light::Directional(sun()));

        let lights = SceneLights::gather(&scene);
        assert_eq!(lights.ambient, Vec3::splat(1.5));
        let (_, target) = lights.spot.unwrap();
        assert!((target - Vec3::new(0.0, 1.0, 2.2)).length() < 1e-6);
        assert_eq!(lights.shadow().unwrap().map_size, 512);
    }

    #[test]
    fn frame_uniforms_carry_fog_and_shadow() {
        let mut scene = Scene::new();
        scene.fog = Some(Fog {
            color: Color::WHITE,
            near: 0.1,
            far: 50.0,
        });
        scene.add_light(Light::Directional(sun()));
        let camera = PerspectiveCamera::from_config(&CameraConfig::primary());
        let lights = SceneLights::gather(&scene);
        let uniforms = FrameUniforms::new(&scene, &camera, &lights);

        assert_eq!(uniforms.fog_color[3], 1.0);
        assert_eq!(uniforms.fog_range[..2], [0.1, 50.0]);
        assert_eq!(uniforms.shadow[0], 1.0);
        assert_eq!(uniforms.shadow[1], -0.005);
        assert_eq!(uniforms.dir_color[..3], [3.0, 3.0, 3.0]);
        assert_eq!(uniforms.spot_color[3], 0.0);

        // Translation is dropped for sky lookups.
        let sky = Mat4::from_cols_array_2d(&uniforms.sky_inverse);
        let centre = sky.project_point3(Vec3::new(0.0, 0.0, 1.0)).normalize();
        assert!((centre - Vec3::NEG_Z).length() < 1e-3);
    }

    #[test]
    fn objects_pack_at_fixed_stride() {
        let a = ObjectUniforms::new(Mat4::IDENTITY, &Material::default(), [30.0, 30.0], true);
        let b = ObjectUniforms::lines(Mat4::from_translation(Vec3::X));
        let bytes = pack_objects(&[a, b]);
        assert_eq!(bytes.len(), 2 * OBJECT_STRIDE as usize);
        let start = OBJECT_STRIDE as usize;
        let second: ObjectUniforms = bytemuck::pod_read_unaligned(
            &bytes[start..start + std::mem::size_of::<ObjectUniforms>()],
        );
        assert_eq!(second, b);
        assert_eq!(a.uv_transform[..2], [30.0, 30.0]);
        assert_eq!(a.flags[0], 1.0);
    }
}
