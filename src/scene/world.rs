//! The stock demo scene.

use super::geometry::{box_geometry, cone_geometry, cylinder_geometry, plane_geometry, sphere_geometry, torus_geometry};
use super::light::{AmbientLight, DirectionalLight, Light, ShadowSettings, SpotLight, SpotTarget};
use super::material::{css, Color, Material};
use super::texture::{FilterMode, TextureSettings, WrapMode};
use super::{Background, Fog, LineSet, Mesh, NodeId, NodeKind, Scene};
use crate::assets::{AssetLoader, ModelRequest};
use crate::config::DemoConfig;
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

pub const CUBE_NAME: &str = "spinning-cube";
pub const HELPER_NAME: &str = "camera-helper";
pub const PIT_NAME: &str = "ball-pit";
pub const BUNNY_PATH: &str = "images/gltf/bunny_gltf.glb";

const GROUND_SIZE: f32 = 60.0;
const PIT_WIDTH: f32 = 10.0;
const PIT_HEIGHT: f32 = 2.0;
const PIT_DEPTH: f32 = 10.0;
const WALL_THICKNESS: f32 = 0.2;
const BALL_RADIUS: f32 = 0.5;

const SKYBOX_FACES: [&str; 6] = [
    "images/px.png",
    "images/nx.png",
    "images/py.png",
    "images/ny.png",
    "images/pz.png",
    "images/nz.png",
];

pub struct World {
    pub scene: Scene,
    /// The box that spins every frame.
    pub cube: NodeId,
    /// Line set outlining the primary camera's frustum.
    pub helper: NodeId,
    pub bunny: ModelRequest,
}

pub fn build(config: &DemoConfig, assets: &mut AssetLoader) -> World {
    let mut scene = Scene::new();
    let sky_blue = Color::from_hex(css::SKY_BLUE);

    let helper = scene.add_node(HELPER_NAME, NodeKind::Lines(LineSet::default()));
    scene.set_visible(helper, false);

    scene.fog = Some(Fog {
        color: Color::from_hex(config.scene.fog_color),
        near: config.primary_camera.near,
        far: config.primary_camera.far,
    });
    let sky = assets.load_cube_texture(&mut scene, SKYBOX_FACES);
    scene.background = Background::CubeTexture {
        texture: sky,
        fallback: sky_blue,
    };

    scene.add_light(Light::Directional(DirectionalLight {
        color: Color::WHITE,
        intensity: 3.0,
        position: Vec3::new(-1.0, 2.0, 4.0),
        target: Vec3::ZERO,
        cast_shadow: true,
        shadow: ShadowSettings {
            map_size: config.renderer.shadow_map_size,
            bias: config.renderer.shadow_bias,
            ..ShadowSettings::default()
        },
    }));
    scene.add_light(Light::Ambient(AmbientLight {
        color: Color::WHITE,
        intensity: 1.0,
    }));

    add_ground(&mut scene, assets);
    let cube = add_cube(&mut scene, assets);

    let mut spot = SpotLight::new(Color::from_hex(0x0FFFFF), 150.0);
    spot.angle = FRAC_PI_4;
    spot.penumbra = 0.2;
    spot.target = SpotTarget::Node(cube);
    scene.add_light(Light::Spot(spot));

    add_table(&mut scene, sky_blue);
    add_donut_stand(&mut scene, assets);
    add_pyramid(&mut scene, assets);
    add_ball_pit(&mut scene, config.scene.ball_count, config.scene.ball_seed);

    let bunny = assets.load_model(
        BUNNY_PATH,
        Box::new(|scene: &mut Scene, root: NodeId| {
            if let Some(node) = scene.node_mut(root) {
                node.transform.position = Vec3::new(0.0, -3.95, -1.0);
            }
            scene.traverse_mut(root, |_, node| {
                if let Some(mesh) = node.mesh_mut() {
                    mesh.cast_shadow = true;
                    mesh.receive_shadow = true;
                }
            });
        }),
    );

    log::info!(
        "Scene built: {} nodes, {} geometries, {} textures requested",
        scene.node_count(),
        scene.geometry_count(),
        scene.textures.len()
    );

    World {
        scene,
        cube,
        helper,
        bunny,
    }
}

fn add_mesh_at(scene: &mut Scene, name: &str, mesh: Mesh, position: Vec3) -> NodeId {
    let id = scene.add_mesh(name, mesh);
    if let Some(node) = scene.node_mut(id) {
        node.transform.position = position;
    }
    id
}

fn shadow_caster(mut mesh: Mesh) -> Mesh {
    mesh.cast_shadow = true;
    mesh
}

fn add_ground(scene: &mut Scene, assets: &mut AssetLoader) {
    let grass = assets.load_texture(
        scene,
        "images/grass.png",
        TextureSettings {
            wrap: WrapMode::Repeat,
            mag_filter: FilterMode::Nearest,
            repeat: Vec2::splat(GROUND_SIZE / 2.0),
            ..TextureSettings::srgb()
        },
    );
    let geometry = scene.add_geometry(plane_geometry(GROUND_SIZE, GROUND_SIZE));
    let mut mesh = Mesh::new(geometry, Material::textured(grass).double_sided());
    mesh.receive_shadow = true;
    let ground = add_mesh_at(scene, "ground", mesh, Vec3::new(0.0, -4.0, 0.0));
    if let Some(node) = scene.node_mut(ground) {
        node.transform.rotation.x = -FRAC_PI_2;
    }
}

fn add_cube(scene: &mut Scene, assets: &mut AssetLoader) -> NodeId {
    let materials = (1..=6)
        .map(|index| {
            let texture = assets.load_texture(
                scene,
                &format!("images/flower-{index}.jpg"),
                TextureSettings::srgb(),
            );
            Material::textured(texture)
        })
        .collect();
    let geometry = scene.add_geometry(box_geometry(1.5, 1.5, 1.5));
    add_mesh_at(
        scene,
        CUBE_NAME,
        shadow_caster(Mesh::with_materials(geometry, materials)),
        Vec3::new(0.0, 1.0, 2.2),
    )
}

fn add_table(scene: &mut Scene, color: Color) {
    let cone = scene.add_geometry(cone_geometry(1.0, 3.0, 32));
    add_mesh_at(
        scene,
        "table-leg",
        shadow_caster(Mesh::new(cone, Material::colored(color))),
        Vec3::new(0.0, -2.45, 2.0),
    );
    let top = scene.add_geometry(box_geometry(4.0, 0.2, 4.0));
    add_mesh_at(
        scene,
        "table-top",
        shadow_caster(Mesh::new(top, Material::colored(color))),
        Vec3::new(0.0, -0.75, 2.0),
    );
}

fn add_donut_stand(scene: &mut Scene, assets: &mut AssetLoader) {
    let donut_texture = assets.load_texture(scene, "images/donut.jpg", TextureSettings::default());
    let torus = scene.add_geometry(torus_geometry(5.0, 2.0, 16, 100));
    add_mesh_at(
        scene,
        "donut",
        shadow_caster(Mesh::new(torus, Material::textured(donut_texture))),
        Vec3::new(0.0, 14.0, -8.0),
    );

    let stand = scene.add_geometry(box_geometry(10.0, 5.0, 3.0));
    add_mesh_at(
        scene,
        "donut-stand",
        shadow_caster(Mesh::new(stand, Material::colored(Color::from_hex(0xFEC0FF)))),
        Vec3::new(0.0, -1.95, -8.0),
    );

    let pole = scene.add_geometry(cylinder_geometry(0.5, 0.5, 15.0, 32));
    let pole_material = Material::colored(Color::from_hex(0xE5E4E2));
    for (name, x) in [("pole-right", 4.5), ("pole-left", -4.5)] {
        add_mesh_at(
            scene,
            name,
            shadow_caster(Mesh::new(pole, pole_material.clone())),
            Vec3::new(x, 5.5, -8.0),
        );
    }
}

fn add_pyramid(scene: &mut Scene, assets: &mut AssetLoader) {
    let rocks = assets.load_texture(scene, "images/rocks.jpg", TextureSettings::default());
    let geometry = scene.add_geometry(cone_geometry(17.0, 20.0, 4));
    add_mesh_at(
        scene,
        "pyramid",
        shadow_caster(Mesh::new(geometry, Material::textured(rocks))),
        Vec3::new(20.0, 0.0, 4.0),
    );
}

fn add_ball_pit(scene: &mut Scene, ball_count: usize, seed: Option<u64>) -> NodeId {
    let pit = scene.add_group(PIT_NAME);
    if let Some(node) = scene.node_mut(pit) {
        node.transform.position = Vec3::new(-15.0, -2.9, 0.0);
    }

    let wall_material = Material::colored(Color::from_hex(0x4E9F3D));
    let front_back = scene.add_geometry(box_geometry(PIT_WIDTH, PIT_HEIGHT, WALL_THICKNESS));
    let bottom = scene.add_geometry(box_geometry(PIT_WIDTH, WALL_THICKNESS, PIT_DEPTH));
    let side = scene.add_geometry(box_geometry(WALL_THICKNESS, PIT_HEIGHT, PIT_DEPTH));
    let walls = [
        ("pit-front", front_back, Vec3::new(0.0, 0.0, PIT_DEPTH / 2.0)),
        ("pit-back", front_back, Vec3::new(0.0, 0.0, -PIT_DEPTH / 2.0)),
        ("pit-bottom", bottom, Vec3::new(0.0, -PIT_HEIGHT / 2.0, 0.0)),
        ("pit-left", side, Vec3::new(-PIT_WIDTH / 2.0, 0.0, 0.0)),
        ("pit-right", side, Vec3::new(PIT_WIDTH / 2.0, 0.0, 0.0)),
    ];
    for (name, geometry, position) in walls {
        let wall = add_mesh_at(scene, name, Mesh::new(geometry, wall_material.clone()), position);
        scene.attach(pit, wall);
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let ball = scene.add_geometry(sphere_geometry(BALL_RADIUS, 16, 16));
    let ball_material = Material::colored(Color::from_hex(0xFF5733));
    for index in 0..ball_count {
        let position = ball_position(&mut rng);
        let id = add_mesh_at(
            scene,
            &format!("ball-{index}"),
            Mesh::new(ball, ball_material.clone()),
            position,
        );
        scene.attach(pit, id);
    }
    pit
}

/// Random ball center inside the pit walls, a little above the floor.
fn ball_position(rng: &mut impl Rng) -> Vec3 {
    let x = rng.random::<f32>() * (PIT_WIDTH - 2.0 * BALL_RADIUS) - (PIT_WIDTH / 2.0 - BALL_RADIUS);
    let y = rng.random::<f32>() + 0.5;
    let z = rng.random::<f32>() * (PIT_DEPTH - 2.0 * BALL_RADIUS) - (PIT_DEPTH / 2.0 - BALL_RADIUS);
    Vec3::new(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::{build, BUNNY_PATH, CUBE_NAME, PIT_NAME};
    use crate::assets::AssetLoader;
    use crate::config::DemoConfig;
    use crate::scene::light::{Light, SpotTarget};
    use crate::scene::{Background, NodeKind};
    use glam::Vec3;

    fn seeded_config() -> DemoConfig {
        let mut config = DemoConfig::new();
        config.scene.ball_seed = Some(42);
        config
    }

    #[test]
    fn stock_scene_has_expected_lights_and_background() {
        let (mut assets, _events) = AssetLoader::detached(".");
        let world = build(&seeded_config(), &mut assets);
        let scene = &world.scene;

        assert_eq!(scene.lights().len(), 3);
        let spot = scene.lights().iter().find_map(|light| match light {
            Light::Spot(spot) => Some(*spot),
            _ => None,
        });
        assert_eq!(spot.map(|spot| spot.target), Some(SpotTarget::Node(world.cube)));
        assert!(matches!(scene.background, Background::CubeTexture { .. }));
        let fog = scene.fog.unwrap();
        assert_eq!((fog.near, fog.far), (0.1, 50.0));
    }

    #[test]
    fn cube_and_helper_start_in_place() {
        let (mut assets, _events) = AssetLoader::detached(".");
        let world = build(&seeded_config(), &mut assets);
        let cube = world.scene.node(world.cube).unwrap();
        assert_eq!(cube.name, CUBE_NAME);
        assert_eq!(cube.transform.position, Vec3::new(0.0, 1.0, 2.2));
        assert_eq!(cube.mesh().unwrap().materials.len(), 6);

        let helper = world.scene.node(world.helper).unwrap();
        assert!(!helper.visible);
        assert!(matches!(helper.kind, NodeKind::Lines(_)));
    }

    #[test]
    fn balls_stay_inside_the_pit() {
        let (mut assets, _events) = AssetLoader::detached(".");
        let world = build(&seeded_config(), &mut assets);
        let scene = &world.scene;
        let pit = scene.find_by_name(PIT_NAME).unwrap();
        let children = scene.node(pit).unwrap().children();
        assert_eq!(children.len(), 5 + 100);

        for id in &children[5..] {
            let p = scene.node(*id).unwrap().transform.position;
            assert!(p.x.abs() <= 4.5 && p.z.abs() <= 4.5);
            assert!((0.5..=1.5).contains(&p.y));
            assert!(!scene.node(*id).unwrap().mesh().unwrap().cast_shadow);
        }
    }

    #[test]
    fn seeded_pits_are_reproducible() {
        let (mut assets, _events) = AssetLoader::detached(".");
        let a = build(&seeded_config(), &mut assets);
        let b = build(&seeded_config(), &mut assets);
        let id = a.scene.find_by_name("ball-17").unwrap();
        assert_eq!(
            a.scene.node(id).unwrap().transform.position,
            b.scene.node(id).unwrap().transform.position
        );
    }

    #[test]
    fn every_texture_and_the_model_are_requested() {
        let (mut assets, _events) = AssetLoader::detached("/demo");
        let world = build(&seeded_config(), &mut assets);
        // Skybox, grass, six flowers, donut and rocks, plus the bunny.
        assert_eq!(world.scene.textures.len(), 10);
        assert_eq!(assets.in_flight(), 11);
        assert!(assets.resolve(BUNNY_PATH).ends_with("images/gltf/bunny_gltf.glb"));
    }
}
