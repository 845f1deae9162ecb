//! Debug panel: camera projection and fog controls plus the camera switch.

use crate::render::PerspectiveCamera;
use crate::scene::Fog;
use std::ops::RangeInclusive;

const NEAR_FAR_RANGE: RangeInclusive<f32> = 0.1..=60.0;
const NEAR_FAR_STEP: f64 = 0.1;
const FOV_RANGE: RangeInclusive<f32> = 1.0..=180.0;

/// Keeps a `min`/`max` pair at least `min_gap` apart. Raising `min` pushes
/// `max` up; lowering `max` re-applies `min`, which pushes `max` back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxHelper {
    pub min_gap: f32,
}

impl MinMaxHelper {
    pub fn new(min_gap: f32) -> Self {
        Self { min_gap }
    }

    pub fn set_min(&self, min: &mut f32, max: &mut f32, value: f32) {
        *min = value;
        *max = max.max(value + self.min_gap);
    }

    pub fn set_max(&self, min: &mut f32, max: &mut f32, value: f32) {
        *max = value;
        let current = *min;
        self.set_min(min, max, current);
    }
}

/// Fog near/far setters that keep `near <= far`.
pub struct FogHelper;

impl FogHelper {
    pub fn set_near(near: &mut f32, far: &mut f32, value: f32) {
        *near = value;
        *far = far.max(value);
    }

    pub fn set_far(near: &mut f32, far: &mut f32, value: f32) {
        *far = value;
        *near = near.min(value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelAction {
    #[default]
    None,
    SwitchCamera,
}

/// Values the panel edits, copied out before the egui pass and applied after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelValues {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub fog: Option<(f32, f32)>,
}

impl PanelValues {
    pub fn capture(camera: &PerspectiveCamera, fog: Option<&Fog>) -> Self {
        Self {
            fov: camera.fov,
            near: camera.near,
            far: camera.far,
            fog: fog.map(|fog| (fog.near, fog.far)),
        }
    }
}

pub struct DebugPanel {
    near_far: MinMaxHelper,
    fog_range: RangeInclusive<f32>,
    camera_label: &'static str,
}

impl DebugPanel {
    /// Fog sliders span the primary camera's initial clip range.
    pub fn new(primary: &PerspectiveCamera) -> Self {
        Self {
            near_far: MinMaxHelper::new(0.1),
            fog_range: primary.near..=primary.far,
            camera_label: "primary",
        }
    }

    pub fn set_camera_label(&mut self, label: &'static str) {
        self.camera_label = label;
    }

    /// Lays out the panel, editing `values` in place.
    pub fn show(&self, ctx: &egui::Context, values: &mut PanelValues) -> PanelAction {
        let mut action = PanelAction::None;
        egui::Window::new("Controls")
            .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.add(egui::Slider::new(&mut values.fov, FOV_RANGE).text("fov"));

                let mut near = values.near;
                let near_slider = egui::Slider::new(&mut near, NEAR_FAR_RANGE)
                    .step_by(NEAR_FAR_STEP)
                    .text("near");
                if ui.add(near_slider).changed() {
                    self.near_far.set_min(&mut values.near, &mut values.far, near);
                }
                let mut far = values.far;
                let far_slider = egui::Slider::new(&mut far, NEAR_FAR_RANGE)
                    .step_by(NEAR_FAR_STEP)
                    .text("far");
                if ui.add(far_slider).changed() {
                    self.near_far.set_max(&mut values.near, &mut values.far, far);
                }

                if let Some((fog_near, fog_far)) = values.fog.as_mut() {
                    ui.separator();
                    let mut near = *fog_near;
                    if ui
                        .add(egui::Slider::new(&mut near, self.fog_range.clone()).text("fog near"))
                        .changed()
                    {
                        FogHelper::set_near(fog_near, fog_far, near);
                    }
                    let mut far = *fog_far;
                    if ui
                        .add(egui::Slider::new(&mut far, self.fog_range.clone()).text("fog far"))
                        .changed()
                    {
                        FogHelper::set_far(fog_near, fog_far, far);
                    }
                }

                ui.separator();
                ui.label(format!("viewing: {} camera", self.camera_label));
                if ui.button("Switch camera").clicked() {
                    action = PanelAction::SwitchCamera;
                }
            });
        action
    }
}

/// Writes edited values back. Returns true when the camera projection changed.
pub fn apply_values(values: &PanelValues, camera: &mut PerspectiveCamera, fog: Option<&mut Fog>) -> bool {
    let changed = camera.fov != values.fov || camera.near != values.near || camera.far != values.far;
    if changed {
        camera.fov = values.fov;
        camera.near = values.near;
        camera.far = values.far;
        camera.update_projection_matrix();
    }
    if let (Some(fog), Some((near, far))) = (fog, values.fog) {
        fog.near = near;
        fog.far = far;
    }
    changed
}
