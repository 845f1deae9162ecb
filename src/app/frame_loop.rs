//! The per-frame render loop and the camera-switch state machine.

use super::timing::FrameClock;
use crate::assets::AssetLoader;
use crate::config::DemoConfig;
use crate::render::frustum_helper::update_helper;
use crate::render::{OrbitControls, PerspectiveCamera, RenderBackend, RenderError, Viewport};
use crate::scene::world::World;
use crate::scene::{NodeId, Scene};
use glam::Vec3;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveCamera {
    #[default]
    Primary,
    Overview,
}

impl ActiveCamera {
    pub fn toggled(self) -> Self {
        match self {
            ActiveCamera::Primary => ActiveCamera::Overview,
            ActiveCamera::Overview => ActiveCamera::Primary,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActiveCamera::Primary => "primary",
            ActiveCamera::Overview => "overview",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    active: ActiveCamera,
}

impl ViewState {
    pub fn active(&self) -> ActiveCamera {
        self.active
    }

    pub fn switch_camera(&mut self) {
        self.active = self.active.toggled();
    }
}

/// A node that turns at a fixed rate around its X and Y axes.
#[derive(Debug, Clone, Copy)]
pub struct Spinner {
    pub node: NodeId,
    /// Radians per second.
    pub angular_rate: f32,
}

impl Spinner {
    pub fn advance(&self, scene: &mut Scene, delta: f32) {
        if let Some(node) = scene.node_mut(self.node) {
            let step = delta * self.angular_rate;
            node.transform.rotation.x += step;
            node.transform.rotation.y += step;
        }
    }
}

pub struct CameraRig {
    pub primary: PerspectiveCamera,
    pub overview: PerspectiveCamera,
    pub primary_controls: OrbitControls,
    pub overview_controls: OrbitControls,
}

impl CameraRig {
    pub fn from_config(config: &DemoConfig) -> Self {
        let primary = PerspectiveCamera::from_config(&config.primary_camera);
        let overview = PerspectiveCamera::from_config(&config.overview_camera);
        let mut rig = Self {
            primary_controls: OrbitControls::new(Vec3::from_array(config.primary_camera.target)),
            overview_controls: OrbitControls::new(Vec3::from_array(config.overview_camera.target)),
            primary,
            overview,
        };
        rig.primary_controls.update(&mut rig.primary);
        rig.overview_controls.update(&mut rig.overview);
        rig
    }

    pub fn camera(&self, which: ActiveCamera) -> &PerspectiveCamera {
        match which {
            ActiveCamera::Primary => &self.primary,
            ActiveCamera::Overview => &self.overview,
        }
    }

    pub fn camera_mut(&mut self, which: ActiveCamera) -> (&mut PerspectiveCamera, &mut OrbitControls) {
        match which {
            ActiveCamera::Primary => (&mut self.primary, &mut self.primary_controls),
            ActiveCamera::Overview => (&mut self.overview, &mut self.overview_controls),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub camera: ActiveCamera,
    pub delta: f32,
    pub resized: Option<(u32, u32)>,
    pub assets_applied: usize,
    pub helper_visible: bool,
}

pub struct FrameLoop {
    pub scene: Scene,
    pub rig: CameraRig,
    view: ViewState,
    clock: FrameClock,
    spinner: Spinner,
    helper: NodeId,
    assets: AssetLoader,
}

impl FrameLoop {
    pub fn new(world: World, rig: CameraRig, assets: AssetLoader, spin_rate: f32) -> Self {
        Self {
            scene: world.scene,
            rig,
            view: ViewState::default(),
            clock: FrameClock::new(),
            spinner: Spinner {
                node: world.cube,
                angular_rate: spin_rate,
            },
            helper: world.helper,
            assets,
        }
    }

    pub fn active_camera(&self) -> ActiveCamera {
        self.view.active()
    }

    /// Takes effect on the next tick.
    pub fn switch_camera(&mut self) {
        self.view.switch_camera();
        log::debug!("Switched to {} camera", self.view.active().label());
    }

    pub fn active_view(&mut self) -> (&mut PerspectiveCamera, &mut OrbitControls) {
        self.rig.camera_mut(self.view.active())
    }

    pub fn assets(&self) -> &AssetLoader {
        &self.assets
    }

    pub fn tick(&mut self, now: Instant, backend: &mut dyn RenderBackend) -> Result<FrameReport, RenderError> {
        let assets_applied = self.assets.poll(&mut self.scene);

        let delta = self.clock.delta(now);
        self.spinner.advance(&mut self.scene, delta);

        let drawable = backend.drawable_size();
        let mut resized = None;
        if drawable != backend.surface_size() && drawable.0 > 0 && drawable.1 > 0 {
            backend.resize_surface(drawable.0, drawable.1);
            resized = Some(drawable);
        }

        backend.set_scissor_test(true);
        let (width, height) = backend.surface_size();
        let region = Viewport::full(width, height);
        backend.set_scissor(region);
        backend.set_viewport(region);

        let active = self.view.active();
        let (camera, controls) = self.rig.camera_mut(active);
        camera.aspect = region.aspect();
        camera.update_projection_matrix();
        controls.update(camera);

        update_helper(&mut self.scene, self.helper, &self.rig.primary);
        let helper_visible = active == ActiveCamera::Overview;
        self.scene.set_visible(self.helper, helper_visible);

        backend.render_frame(&self.scene, self.rig.camera(active))?;

        Ok(FrameReport {
            camera: active,
            delta,
            resized,
            assets_applied,
            helper_visible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ActiveCamera, CameraRig, FrameLoop, ViewState};
    use crate::assets::model::{ModelData, ModelNode, ModelPrimitive};
    use crate::assets::{AssetEvent, AssetLoader, ModelRequest};
    use crate::config::DemoConfig;
    use crate::render::{PerspectiveCamera, RenderBackend, RenderError, Viewport};
    use crate::scene::geometry::box_geometry;
    use crate::scene::world;
    use crate::scene::{NodeId, NodeKind, Scene};
    use glam::Mat4;
    use std::sync::mpsc::Sender;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, PartialEq)]
    struct RenderedFrame {
        fov: f32,
        aspect: f32,
        scissor_test: bool,
        scissor: Viewport,
        viewport: Viewport,
        helper_visible: bool,
        bunny_meshes: usize,
        bunny_shadowed: bool,
    }

    struct RecordingBackend {
        drawable: (u32, u32),
        surface: (u32, u32),
        scissor_test: bool,
        scissor: Viewport,
        viewport: Viewport,
        resizes: Vec<(u32, u32)>,
        frames: Vec<RenderedFrame>,
    }

    impl RecordingBackend {
        fn new(width: u32, height: u32) -> Self {
            Self {
                drawable: (width, height),
                surface: (width, height),
                scissor_test: false,
                scissor: Viewport::default(),
                viewport: Viewport::default(),
                resizes: Vec::new(),
                frames: Vec::new(),
            }
        }
    }

    impl RenderBackend for RecordingBackend {
        fn drawable_size(&self) -> (u32, u32) {
            self.drawable
        }

        fn surface_size(&self) -> (u32, u32) {
            self.surface
        }

        fn resize_surface(&mut self, width: u32, height: u32) {
            self.surface = (width, height);
            self.resizes.push((width, height));
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
            let helper = scene.find_by_name(world::HELPER_NAME).unwrap();
            let mut bunny_meshes = 0;
            let mut bunny_shadowed = true;
            if let Some(root) = scene.find_by_name("bunny_gltf") {
                scene.traverse(root, |_, node| {
                    if let NodeKind::Mesh(mesh) = &node.kind {
                        bunny_meshes += 1;
                        bunny_shadowed &= mesh.cast_shadow && mesh.receive_shadow;
                    }
                });
            }
            self.frames.push(RenderedFrame {
                fov: camera.fov,
                aspect: camera.aspect,
                scissor_test: self.scissor_test,
                scissor: self.scissor,
                viewport: self.viewport,
                helper_visible: scene.node(helper).unwrap().visible,
                bunny_meshes,
                bunny_shadowed: bunny_meshes > 0 && bunny_shadowed,
            });
            Ok(())
        }
    }

    struct Handles {
        cube: NodeId,
        helper: NodeId,
        bunny: ModelRequest,
    }

    fn demo_loop() -> (FrameLoop, Sender<AssetEvent>, Handles) {
        let mut config = DemoConfig::new();
        config.scene.ball_seed = Some(1);
        config.scene.ball_count = 4;
        let (mut assets, events) = AssetLoader::detached(".");
        let world = world::build(&config, &mut assets);
        let handle = Handles {
            cube: world.cube,
            helper: world.helper,
            bunny: world.bunny,
        };
        let frame_loop = FrameLoop::new(world, CameraRig::from_config(&config), assets, config.scene.spin_rate);
        (frame_loop, events, handle)
    }

    fn bunny_model() -> ModelData {
        let primitive = |geometry| ModelPrimitive {
            geometry,
            color: [0.8, 0.8, 0.8],
            image: None,
            double_sided: false,
        };
        ModelData {
            name: "bunny_gltf".to_string(),
            nodes: vec![
                ModelNode {
                    name: "body".to_string(),
                    local: Mat4::IDENTITY,
                    parent: None,
                    primitives: vec![primitive(0), primitive(1)],
                },
                ModelNode {
                    name: "tail".to_string(),
                    local: Mat4::IDENTITY,
                    parent: Some(0),
                    primitives: vec![primitive(1)],
                },
            ],
            geometries: vec![box_geometry(1.0, 1.0, 1.0), box_geometry(0.1, 0.1, 0.1)],
            images: Vec::new(),
        }
    }

    fn cube_rotation(frame_loop: &FrameLoop, handle: &Handles) -> glam::Vec3 {
        frame_loop.scene.node(handle.cube).unwrap().transform.rotation
    }

    #[test]
    fn rotation_is_frame_rate_independent() {
        let start = Instant::now();
        let mut totals = Vec::new();
        for fps in [60u32, 144] {
            let (mut frame_loop, _events, handle) = demo_loop();
            let mut backend = RecordingBackend::new(800, 600);
            let frames = fps * 10;
            for frame in 0..=frames {
                let now = start + Duration::from_secs_f64(frame as f64 / fps as f64);
                frame_loop.tick(now, &mut backend).unwrap();
            }
            totals.push(cube_rotation(&frame_loop, &handle));
        }
        for total in &totals {
            assert!((total.x - 5.0).abs() < 1e-3);
            assert!((total.y - 5.0).abs() < 1e-3);
        }
        assert!((totals[0] - totals[1]).length() < 1e-3);
    }

    #[test]
    fn first_tick_does_not_rotate() {
        let (mut frame_loop, _events, handle) = demo_loop();
        let mut backend = RecordingBackend::new(800, 600);
        let report = frame_loop.tick(Instant::now(), &mut backend).unwrap();
        assert_eq!(report.delta, 0.0);
        assert_eq!(cube_rotation(&frame_loop, &handle), glam::Vec3::ZERO);
    }

    #[test]
    fn toggling_is_an_involution() {
        let mut view = ViewState::default();
        assert_eq!(view.active(), ActiveCamera::Primary);
        for count in 1..=7 {
            view.switch_camera();
            let expected = if count % 2 == 1 {
                ActiveCamera::Overview
            } else {
                ActiveCamera::Primary
            };
            assert_eq!(view.active(), expected);
        }
        assert_eq!(ActiveCamera::Overview.toggled().toggled(), ActiveCamera::Overview);
    }

    #[test]
    fn switch_waits_for_next_tick() {
        let (mut frame_loop, _events, _) = demo_loop();
        let mut backend = RecordingBackend::new(800, 600);
        frame_loop.switch_camera();
        assert!(backend.frames.is_empty());
        frame_loop.tick(Instant::now(), &mut backend).unwrap();
        assert_eq!(backend.frames.len(), 1);
        assert_eq!(backend.frames[0].fov, 60.0);
    }

    #[test]
    fn exactly_one_render_per_tick_for_either_camera() {
        let (mut frame_loop, _events, _) = demo_loop();
        let mut backend = RecordingBackend::new(800, 600);
        let start = Instant::now();
        for frame in 0..6u64 {
            if frame % 2 == 1 {
                frame_loop.switch_camera();
            }
            frame_loop
                .tick(start + Duration::from_millis(16 * frame), &mut backend)
                .unwrap();
            assert_eq!(backend.frames.len() as u64, frame + 1);
        }
        assert!(backend
            .frames
            .iter()
            .all(|frame| frame.scissor_test && frame.scissor == frame.viewport));
    }

    #[test]
    fn aspect_tracks_surface_after_resize() {
        let (mut frame_loop, _events, _) = demo_loop();
        let mut backend = RecordingBackend::new(800, 600);
        let start = Instant::now();
        frame_loop.tick(start, &mut backend).unwrap();
        assert_eq!(backend.frames[0].aspect, 800.0 / 600.0);

        backend.drawable = (1920, 600);
        let report = frame_loop
            .tick(start + Duration::from_millis(16), &mut backend)
            .unwrap();
        assert_eq!(report.resized, Some((1920, 600)));
        assert_eq!(backend.resizes, vec![(1920, 600)]);
        assert_eq!(backend.frames[1].aspect, 1920.0 / 600.0);
        assert_eq!(frame_loop.rig.primary.aspect, 1920.0 / 600.0);
        assert_eq!(backend.frames[1].viewport, Viewport::full(1920, 600));

        // Unchanged size does not resize again.
        frame_loop
            .tick(start + Duration::from_millis(32), &mut backend)
            .unwrap();
        assert_eq!(backend.resizes.len(), 1);
    }

    #[test]
    fn minimized_window_keeps_last_surface() {
        let (mut frame_loop, _events, _) = demo_loop();
        let mut backend = RecordingBackend::new(800, 600);
        backend.drawable = (0, 0);
        let report = frame_loop.tick(Instant::now(), &mut backend).unwrap();
        assert_eq!(report.resized, None);
        assert_eq!(backend.frames[0].aspect, 800.0 / 600.0);
    }

    #[test]
    fn overview_scenario_shows_helper_and_follows_resize() {
        let (mut frame_loop, _events, _) = demo_loop();
        let mut backend = RecordingBackend::new(800, 600);
        let start = Instant::now();

        frame_loop.tick(start, &mut backend).unwrap();
        assert_eq!(backend.frames[0].fov, 75.0);
        assert!(!backend.frames[0].helper_visible);

        frame_loop.switch_camera();
        assert_eq!(frame_loop.active_camera(), ActiveCamera::Overview);
        backend.drawable = (1024, 768);
        let report = frame_loop
            .tick(start + Duration::from_millis(16), &mut backend)
            .unwrap();
        assert!(report.helper_visible);
        let frame = &backend.frames[1];
        assert_eq!(frame.fov, 60.0);
        assert!(frame.helper_visible);
        assert!((frame.aspect - 1024.0 / 768.0).abs() < 1e-6);

        frame_loop.switch_camera();
        frame_loop
            .tick(start + Duration::from_millis(32), &mut backend)
            .unwrap();
        assert!(!backend.frames[2].helper_visible);
    }

    #[test]
    fn late_model_appears_with_shadow_flags() {
        let (mut frame_loop, events, handle) = demo_loop();
        let mut backend = RecordingBackend::new(800, 600);
        let start = Instant::now();
        for frame in 0..6u64 {
            if frame == 3 {
                events
                    .send(AssetEvent::ModelLoaded {
                        request: handle.bunny,
                        model: bunny_model(),
                    })
                    .unwrap();
            }
            let report = frame_loop
                .tick(start + Duration::from_millis(16 * frame), &mut backend)
                .unwrap();
            assert_eq!(report.assets_applied, usize::from(frame == 3));
        }
        for frame in &backend.frames[..3] {
            assert_eq!(frame.bunny_meshes, 0);
        }
        for frame in &backend.frames[3..] {
            assert_eq!(frame.bunny_meshes, 3);
            assert!(frame.bunny_shadowed);
        }
        let root = frame_loop.scene.find_by_name("bunny_gltf").unwrap();
        assert_eq!(
            frame_loop.scene.node(root).unwrap().transform.position,
            glam::Vec3::new(0.0, -3.95, -1.0)
        );
    }

    #[test]
    fn helper_outlines_primary_camera_from_overview() {
        let (mut frame_loop, _events, handle) = demo_loop();
        let mut backend = RecordingBackend::new(800, 600);
        frame_loop.switch_camera();
        frame_loop.rig.primary.far = 20.0;
        frame_loop.rig.primary.update_projection_matrix();
        frame_loop.tick(Instant::now(), &mut backend).unwrap();
        let NodeKind::Lines(lines) = &frame_loop.scene.node(handle.helper).unwrap().kind else {
            panic!("helper is not a line set");
        };
        // The far-plane corner sits 20 units in front of the primary camera at z = 6.
        assert!((lines.vertices[8].position[2] + 14.0).abs() < 1e-2);
    }
}
