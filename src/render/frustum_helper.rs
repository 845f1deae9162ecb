use crate::render::camera::PerspectiveCamera;
use crate::scene::material::Color;
use crate::scene::{LineSet, LineVertex, NodeId, NodeKind, Scene};
use glam::Vec3;

const FRUSTUM: u32 = 0xFFAA00;
const CONE: u32 = 0xFF0000;
const UP: u32 = 0x00AAFF;
const TARGET: u32 = 0xFFFFFF;
const CROSS: u32 = 0x333333;

/// Named points of the helper in normalized device coordinates (depth 0 = near, 1 = far).
#[derive(Clone, Copy)]
enum Point {
    Ndc(f32, f32, f32),
    Eye,
}

const N1: Point = Point::Ndc(-1.0, -1.0, 0.0);
const N2: Point = Point::Ndc(1.0, -1.0, 0.0);
const N3: Point = Point::Ndc(-1.0, 1.0, 0.0);
const N4: Point = Point::Ndc(1.0, 1.0, 0.0);
const F1: Point = Point::Ndc(-1.0, -1.0, 1.0);
const F2: Point = Point::Ndc(1.0, -1.0, 1.0);
const F3: Point = Point::Ndc(-1.0, 1.0, 1.0);
const F4: Point = Point::Ndc(1.0, 1.0, 1.0);
const U1: Point = Point::Ndc(0.7, 1.1, 0.0);
const U2: Point = Point::Ndc(-0.7, 1.1, 0.0);
const U3: Point = Point::Ndc(0.0, 2.0, 0.0);
const C: Point = Point::Ndc(0.0, 0.0, 0.0);
const T: Point = Point::Ndc(0.0, 0.0, 1.0);
const CN1: Point = Point::Ndc(-1.0, 0.0, 0.0);
const CN2: Point = Point::Ndc(1.0, 0.0, 0.0);
const CN3: Point = Point::Ndc(0.0, -1.0, 0.0);
const CN4: Point = Point::Ndc(0.0, 1.0, 0.0);
const CF1: Point = Point::Ndc(-1.0, 0.0, 1.0);
const CF2: Point = Point::Ndc(1.0, 0.0, 1.0);
const CF3: Point = Point::Ndc(0.0, -1.0, 1.0);
const CF4: Point = Point::Ndc(0.0, 1.0, 1.0);
const P: Point = Point::Eye;

const SEGMENTS: [(Point, Point, u32); 25] = [
    // near
    (N1, N2, FRUSTUM),
    (N2, N4, FRUSTUM),
    (N4, N3, FRUSTUM),
    (N3, N1, FRUSTUM),
    // far
    (F1, F2, FRUSTUM),
    (F2, F4, FRUSTUM),
    (F4, F3, FRUSTUM),
    (F3, F1, FRUSTUM),
    // sides
    (N1, F1, FRUSTUM),
    (N2, F2, FRUSTUM),
    (N3, F3, FRUSTUM),
    (N4, F4, FRUSTUM),
    // cone
    (P, N1, CONE),
    (P, N2, CONE),
    (P, N3, CONE),
    (P, N4, CONE),
    // up
    (U1, U2, UP),
    (U2, U3, UP),
    (U3, U1, UP),
    // target
    (C, T, TARGET),
    (P, C, CONE),
    // cross
    (CN1, CN2, CROSS),
    (CN3, CN4, CROSS),
    (CF1, CF2, CROSS),
    (CF3, CF4, CROSS),
];

pub const SEGMENT_COUNT: usize = SEGMENTS.len();

/// World-space line segments outlining `camera`'s view volume.
pub fn frustum_lines(camera: &PerspectiveCamera) -> LineSet {
    let inverse = camera.view_projection().inverse();
    let resolve = |point: Point| match point {
        Point::Ndc(x, y, z) => inverse.project_point3(Vec3::new(x, y, z)),
        Point::Eye => camera.position,
    };
    let mut vertices = Vec::with_capacity(SEGMENTS.len() * 2);
    for (a, b, color) in SEGMENTS {
        let color = Color::from_hex(color).to_array();
        vertices.push(LineVertex {
            position: resolve(a).to_array(),
            color,
        });
        vertices.push(LineVertex {
            position: resolve(b).to_array(),
            color,
        });
    }
    LineSet { vertices }
}

/// Rebuilds the helper node's lines from `camera`. Returns false if `helper` is not a line node.
pub fn update_helper(scene: &mut Scene, helper: NodeId, camera: &PerspectiveCamera) -> bool {
    let Some(node) = scene.node_mut(helper) else {
        return false;
    };
    match &mut node.kind {
        NodeKind::Lines(lines) => {
            *lines = frustum_lines(camera);
            true
        }
        _ => false,
    }
}
