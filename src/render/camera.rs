use crate::config::CameraConfig;
use glam::{Mat4, Quat, Vec3};

const EPS: f32 = 1e-6;
/// Closest the orbit camera may get to its target.
const MIN_ORBIT_RADIUS: f32 = 1e-3;

/// Perspective camera with a cached projection matrix.
///
/// Changing `fov`, `aspect`, `near` or `far` has no effect on rendering until
/// [`PerspectiveCamera::update_projection_matrix`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub up: Vec3,
    look_target: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            up: Vec3::Y,
            look_target: Vec3::NEG_Z,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        let mut camera = Self::new(config.fov, config.aspect, config.near, config.far);
        camera.position = Vec3::from_array(config.position);
        camera.look_at(Vec3::from_array(config.target));
        camera
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.look_target = target;
    }

    pub fn look_target(&self) -> Vec3 {
        self.look_target
    }

    pub fn update_projection_matrix(&mut self) {
        let aspect = if self.aspect.is_finite() && self.aspect > 0.0 {
            self.aspect
        } else {
            1.0
        };
        let near = self.near.max(EPS);
        let far = self.far.max(near + EPS);
        self.projection = Mat4::perspective_rh(self.fov.to_radians(), aspect, near, far);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        let forward = self.look_target - self.position;
        if forward.length_squared() < EPS {
            return Mat4::look_to_rh(self.position, Vec3::NEG_Z, self.up);
        }
        Mat4::look_at_rh(self.position, self.look_target, self.up)
    }

    /// Camera-to-world transform.
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

}

/// Orbit-style camera controls: rotate around a target, pan it, dolly toward it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
    pending_pan: Vec3,
    theta: f32,
    phi: f32,
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: MIN_ORBIT_RADIUS,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: std::f32::consts::PI,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
            pending_pan: Vec3::ZERO,
            theta: 0.0,
            phi: std::f32::consts::FRAC_PI_2,
        }
    }

    /// Queues a rotation from a pointer drag of `(dx, dy)` pixels in a view `viewport_height` tall.
    pub fn rotate_by_pixels(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        let full_turn = std::f32::consts::TAU;
        self.pending_theta -= full_turn * dx / height * self.rotate_speed;
        self.pending_phi -= full_turn * dy / height * self.rotate_speed;
    }

    /// Queues a dolly; positive steps move toward the target.
    pub fn dolly(&mut self, steps: f32) {
        let scale = 0.95f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.pending_scale *= scale;
        } else if steps < 0.0 {
            self.pending_scale /= scale;
        }
    }

    /// Queues a screen-space pan of `(dx, dy)` pixels.
    pub fn pan_by_pixels(&mut self, camera: &PerspectiveCamera, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        let offset = camera.position - self.target;
        let target_distance = offset.length() * (camera.fov.to_radians() / 2.0).tan();
        let world = camera.world_matrix();
        let right = world.x_axis.truncate().normalize_or(Vec3::X);
        let up = world.y_axis.truncate().normalize_or(Vec3::Y);
        let left = -right * (2.0 * dx * target_distance / height) * self.pan_speed;
        let upward = up * (2.0 * dy * target_distance / height) * self.pan_speed;
        self.pending_pan += left + upward;
    }

    /// Applies queued input and re-aims the camera at the target.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let to_y_up = Quat::from_rotation_arc(camera.up.normalize_or(Vec3::Y), Vec3::Y);
        let offset = to_y_up * offset;

        let (mut radius, mut theta, mut phi) = match to_spherical(offset) {
            Some(spherical) => spherical,
            None => (0.0, self.theta, self.phi),
        };
        theta += self.pending_theta;
        phi += self.pending_phi;
        phi = phi.clamp(self.min_polar_angle, self.max_polar_angle);
        phi = phi.clamp(EPS, std::f32::consts::PI - EPS);
        radius = (radius * self.pending_scale)
            .clamp(self.min_distance, self.max_distance)
            .max(MIN_ORBIT_RADIUS);
        self.theta = theta;
        self.phi = phi;

        self.target += self.pending_pan;
        let offset = to_y_up.inverse() * from_spherical(radius, theta, phi);
        let new_position = self.target + offset;

        let changed = (new_position - camera.position).length_squared() > EPS * EPS
            || camera.look_target() != self.target;
        camera.position = new_position;
        camera.look_at(self.target);

        self.pending_theta = 0.0;
        self.pending_phi = 0.0;
        self.pending_scale = 1.0;
        self.pending_pan = Vec3::ZERO;
        changed
    }
}

/// `(radius, theta, phi)` with theta around +Y measured from +Z and phi from +Y.
/// `None` when `v` is too short to carry a direction.
fn to_spherical(v: Vec3) -> Option<(f32, f32, f32)> {
    let radius = v.length();
    if radius < EPS {
        return None;
    }
    let theta = v.x.atan2(v.z);
    let phi = (v.y / radius).clamp(-1.0, 1.0).acos();
    Some((radius, theta, phi))
}

fn from_spherical(radius: f32, theta: f32, phi: f32) -> Vec3 {
    let sin_phi_radius = phi.sin() * radius;
    Vec3::new(
        sin_phi_radius * theta.sin(),
        phi.cos() * radius,
        sin_phi_radius * theta.cos(),
    )
}

#[cfg(test)]
mod tests {
    use super::{OrbitControls, PerspectiveCamera};
    use crate::config::CameraConfig;
    use glam::{Vec3, Vec4};

    #[test]
    fn projection_only_changes_on_update() {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 50.0);
        let before = camera.projection_matrix();
        camera.aspect = 2.0;
        assert_eq!(camera.projection_matrix(), before);
        camera.update_projection_matrix();
        assert_ne!(camera.projection_matrix(), before);
        // x scale halves when the aspect doubles.
        let ratio = before.x_axis.x / camera.projection_matrix().x_axis.x;
        assert!((ratio - 2.0).abs() < 1e-5);
    }

    #[test]
    fn near_and_far_planes_map_to_unit_depth_range() {
        let camera = PerspectiveCamera::new(60.0, 1.5, 0.5, 20.0);
        let near = camera.projection_matrix() * Vec4::new(0.0, 0.0, -0.5, 1.0);
        let far = camera.projection_matrix() * Vec4::new(0.0, 0.0, -20.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn from_config_places_and_aims_camera() {
        let camera = PerspectiveCamera::from_config(&CameraConfig::overview());
        assert_eq!(camera.position, Vec3::new(40.0, 10.0, 30.0));
        let view = camera.view_matrix();
        let target_in_view = view.transform_point3(Vec3::ZERO);
        assert!(target_in_view.x.abs() < 1e-4);
        assert!(target_in_view.y.abs() < 1e-4);
        assert!(target_in_view.z < 0.0);
    }

    #[test]
    fn orbit_keeps_distance_to_target() {
        let mut camera = PerspectiveCamera::from_config(&CameraConfig::primary());
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.rotate_by_pixels(120.0, -40.0, 600.0);
        assert!(controls.update(&mut camera));
        assert!((camera.position.length() - 6.0).abs() < 1e-4);
        assert_eq!(camera.look_target(), Vec3::ZERO);
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let mut camera = PerspectiveCamera::from_config(&CameraConfig::primary());
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.rotate_by_pixels(0.0, 10_000.0, 600.0);
        controls.update(&mut camera);
        let offset = camera.position.normalize();
        assert!(offset.y < 1.0);
        assert!(camera.position.is_finite());
    }

    #[test]
    fn dolly_in_moves_closer_and_out_moves_away() {
        let mut camera = PerspectiveCamera::from_config(&CameraConfig::primary());
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.dolly(1.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - 6.0 * 0.95).abs() < 1e-4);
        controls.dolly(-2.0);
        controls.update(&mut camera);
        assert!(camera.position.length() > 6.0);
    }

    #[test]
    fn zooming_all_the_way_in_can_zoom_back_out() {
        let mut camera = PerspectiveCamera::from_config(&CameraConfig::primary());
        let mut controls = OrbitControls::new(Vec3::ZERO);
        for _ in 0..400 {
            controls.dolly(1.0);
            controls.update(&mut camera);
        }
        let closest = camera.position.length();
        assert!(closest.is_finite() && closest > 0.0);
        // Still looking at the target from the original side.
        assert!(camera.position.z > 0.0);

        for _ in 0..400 {
            controls.dolly(-1.0);
            controls.update(&mut camera);
        }
        let distance = camera.position.length();
        assert!(distance.is_finite());
        assert!(distance > closest);
        assert!(distance > 1.0);
    }

    #[test]
    fn degenerate_offset_keeps_last_orbit_angles() {
        let mut camera = PerspectiveCamera::from_config(&CameraConfig::primary());
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.update(&mut camera);
        camera.position = Vec3::ZERO;
        controls.update(&mut camera);
        let offset = camera.position - controls.target;
        assert!(offset.length() > 0.0);
        assert!(offset.normalize().z > 0.99);
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let mut camera = PerspectiveCamera::from_config(&CameraConfig::primary());
        let mut controls = OrbitControls::new(Vec3::ZERO);
        let before = camera.position - controls.target;
        controls.pan_by_pixels(&camera, 50.0, 0.0, 600.0);
        controls.update(&mut camera);
        // Dragging right slides the view left along camera-space X.
        assert!(controls.target.x < 0.0);
        let after = camera.position - controls.target;
        assert!((after - before).length() < 1e-4);
    }

    #[test]
    fn first_update_reaims_camera_at_target() {
        let mut camera = PerspectiveCamera::from_config(&CameraConfig::overview());
        camera.look_at(Vec3::new(0.0, 5.0, 0.0));
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.update(&mut camera);
        assert_eq!(camera.look_target(), Vec3::ZERO);
        assert!((camera.position - Vec3::new(40.0, 10.0, 30.0)).length() < 1e-3);
    }
}
