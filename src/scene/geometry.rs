//! Indexed triangle geometry and the primitive shapes used by the demo scene.
//!
//! Generators follow the usual web-3D conventions: counter-clockwise front
//! faces, planes built in XY facing +Z, boxes split into six face groups
//! ordered +X, -X, +Y, -Y, +Z, -Z, cylinders/cones along Y with side, top and
//! bottom groups.

use glam::Vec3;
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub(crate) usize);

/// A contiguous index range drawn with one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub groups: Vec<GeometryGroup>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> u32 {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        (self.positions.len() - 1) as u32
    }

    fn add_group(&mut self, start: usize, count: usize, material_index: usize) {
        self.groups.push(GeometryGroup {
            start: start as u32,
            count: count as u32,
            material_index,
        });
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for empty geometry.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = Vec3::from_array(*self.positions.first()?);
        Some(self.positions.iter().fold((first, first), |(min, max), p| {
            let p = Vec3::from_array(*p);
            (min.min(p), max.max(p))
        }))
    }

    /// Recomputes smooth vertex normals from triangle faces (area weighted).
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let (Some(a), Some(b), Some(c)) = (
                self.positions.get(ia),
                self.positions.get(ib),
                self.positions.get(ic),
            ) else {
                continue;
            };
            let (a, b, c) = (Vec3::from_array(*a), Vec3::from_array(*b), Vec3::from_array(*c));
            let face = (c - b).cross(a - b);
            accum[ia] += face;
            accum[ib] += face;
            accum[ic] += face;
        }
        self.normals = accum
            .into_iter()
            .map(|n| n.normalize_or(Vec3::Y).to_array())
            .collect();
    }
}

/// Box centered at the origin, one group per face.
pub fn box_geometry(width: f32, height: f32, depth: f32) -> Geometry {
    let mut geometry = Geometry::default();
    // (u axis, v axis, w axis, u dir, v dir, plane width, plane height, plane depth)
    let faces: [(usize, usize, usize, f32, f32, f32, f32, f32); 6] = [
        (2, 1, 0, -1.0, -1.0, depth, height, width),
        (2, 1, 0, 1.0, -1.0, depth, height, -width),
        (0, 2, 1, 1.0, 1.0, width, depth, height),
        (0, 2, 1, 1.0, -1.0, width, depth, -height),
        (0, 1, 2, 1.0, -1.0, width, height, depth),
        (0, 1, 2, -1.0, -1.0, width, height, -depth),
    ];
    for (material_index, (u, v, w, udir, vdir, plane_w, plane_h, plane_d)) in
        faces.into_iter().enumerate()
    {
        let group_start = geometry.indices.len();
        let base = geometry.positions.len() as u32;
        for iy in 0..2u32 {
            let y = iy as f32 * plane_h - plane_h / 2.0;
            for ix in 0..2u32 {
                let x = ix as f32 * plane_w - plane_w / 2.0;
                let mut position = [0.0f32; 3];
                position[u] = x * udir;
                position[v] = y * vdir;
                position[w] = plane_d / 2.0;
                let mut normal = [0.0f32; 3];
                normal[w] = if plane_d > 0.0 { 1.0 } else { -1.0 };
                geometry.push_vertex(position, normal, [ix as f32, 1.0 - iy as f32]);
            }
        }
        let (a, b, c, d) = (base, base + 2, base + 3, base + 1);
        geometry.indices.extend_from_slice(&[a, b, d, b, c, d]);
        geometry.add_group(group_start, 6, material_index);
    }
    geometry
}

/// Flat rectangle in the XY plane facing +Z.
pub fn plane_geometry(width: f32, height: f32) -> Geometry {
    let mut geometry = Geometry::default();
    for iy in 0..2u32 {
        let y = iy as f32 * height - height / 2.0;
        for ix in 0..2u32 {
            let x = ix as f32 * width - width / 2.0;
            geometry.push_vertex([x, -y, 0.0], [0.0, 0.0, 1.0], [ix as f32, 1.0 - iy as f32]);
        }
    }
    geometry.indices.extend_from_slice(&[0, 2, 1, 2, 3, 1]);
    geometry
}

pub fn sphere_geometry(radius: f32, width_segments: u32, height_segments: u32) -> Geometry {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut geometry = Geometry::default();
    let mut grid: Vec<Vec<u32>> = Vec::with_capacity(height_segments as usize + 1);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let u_offset = if iy == 0 {
            0.5 / width_segments as f32
        } else if iy == height_segments {
            -0.5 / width_segments as f32
        } else {
            0.0
        };
        let mut row = Vec::with_capacity(width_segments as usize + 1);
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let phi = u * PI * 2.0;
            let theta = v * PI;
            let position = Vec3::new(
                -radius * phi.cos() * theta.sin(),
                radius * theta.cos(),
                radius * phi.sin() * theta.sin(),
            );
            let normal = position.normalize_or(Vec3::Y);
            row.push(geometry.push_vertex(
                position.to_array(),
                normal.to_array(),
                [u + u_offset, 1.0 - v],
            ));
        }
        grid.push(row);
    }

    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            if iy != 0 {
                geometry.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments as usize - 1 {
                geometry.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    geometry
}

/// Capped cylinder along Y; groups are side (0), top cap (1), bottom cap (2).
pub fn cylinder_geometry(
    radius_top: f32,
    radius_bottom: f32,
    height: f32,
    radial_segments: u32,
) -> Geometry {
    let radial_segments = radial_segments.max(3);
    let half_height = height / 2.0;
    let slope = (radius_bottom - radius_top) / height;
    let mut geometry = Geometry::default();

    let mut rows: Vec<Vec<u32>> = Vec::with_capacity(2);
    for y in 0..=1u32 {
        let v = y as f32;
        let radius = v * (radius_bottom - radius_top) + radius_top;
        let mut row = Vec::with_capacity(radial_segments as usize + 1);
        for x in 0..=radial_segments {
            let u = x as f32 / radial_segments as f32;
            let theta = u * PI * 2.0;
            let (sin, cos) = theta.sin_cos();
            let normal = Vec3::new(sin, slope, cos).normalize_or(Vec3::Y);
            row.push(geometry.push_vertex(
                [radius * sin, -v * height + half_height, radius * cos],
                normal.to_array(),
                [u, 1.0 - v],
            ));
        }
        rows.push(row);
    }

    let side_start = geometry.indices.len();
    for x in 0..radial_segments as usize {
        let a = rows[0][x];
        let b = rows[1][x];
        let c = rows[1][x + 1];
        let d = rows[0][x + 1];
        if radius_top > 0.0 {
            geometry.indices.extend_from_slice(&[a, b, d]);
        }
        if radius_bottom > 0.0 {
            geometry.indices.extend_from_slice(&[b, c, d]);
        }
    }
    geometry.add_group(side_start, geometry.indices.len() - side_start, 0);

    if radius_top > 0.0 {
        push_cap(&mut geometry, true, radius_top, half_height, radial_segments);
    }
    if radius_bottom > 0.0 {
        push_cap(&mut geometry, false, radius_bottom, half_height, radial_segments);
    }
    geometry
}

fn push_cap(geometry: &mut Geometry, top: bool, radius: f32, half_height: f32, segments: u32) {
    let sign = if top { 1.0 } else { -1.0 };
    let group_start = geometry.indices.len();
    let center_start = geometry.positions.len() as u32;
    for _ in 0..segments {
        geometry.push_vertex([0.0, half_height * sign, 0.0], [0.0, sign, 0.0], [0.5, 0.5]);
    }
    let rim_start = geometry.positions.len() as u32;
    for x in 0..=segments {
        let theta = x as f32 / segments as f32 * PI * 2.0;
        let (sin, cos) = theta.sin_cos();
        geometry.push_vertex(
            [radius * sin, half_height * sign, radius * cos],
            [0.0, sign, 0.0],
            [cos * 0.5 + 0.5, sin * 0.5 * sign + 0.5],
        );
    }
    for x in 0..segments {
        let center = center_start + x;
        let rim = rim_start + x;
        if top {
            geometry.indices.extend_from_slice(&[rim, rim + 1, center]);
        } else {
            geometry.indices.extend_from_slice(&[rim + 1, rim, center]);
        }
    }
    let material_index = if top { 1 } else { 2 };
    geometry.add_group(group_start, geometry.indices.len() - group_start, material_index);
}

/// Cone with its apex at +Y; four radial segments give a square pyramid.
pub fn cone_geometry(radius: f32, height: f32, radial_segments: u32) -> Geometry {
    cylinder_geometry(0.0, radius, height, radial_segments)
}

/// Torus in the XY plane around the Z axis.
pub fn torus_geometry(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Geometry {
    let radial_segments = radial_segments.max(3);
    let tubular_segments = tubular_segments.max(3);
    let mut geometry = Geometry::default();

    for j in 0..=radial_segments {
        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * PI * 2.0;
            let v = j as f32 / radial_segments as f32 * PI * 2.0;
            let position = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            let normal = (position - center).normalize_or(Vec3::Z);
            geometry.push_vertex(
                position.to_array(),
                normal.to_array(),
                [
                    i as f32 / tubular_segments as f32,
                    j as f32 / radial_segments as f32,
                ],
            );
        }
    }

    let stride = tubular_segments + 1;
    for j in 1..=radial_segments {
        for i in 1..=tubular_segments {
            let a = stride * j + i - 1;
            let b = stride * (j - 1) + i - 1;
            let c = stride * (j - 1) + i;
            let d = stride * j + i;
            geometry.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_range(geometry: &Geometry) {
        let count = geometry.vertex_count() as u32;
        assert!(geometry.indices.iter().all(|&index| index < count));
        assert_eq!(geometry.indices.len() % 3, 0);
        assert_eq!(geometry.normals.len(), geometry.positions.len());
        assert_eq!(geometry.uvs.len(), geometry.positions.len());
    }

    #[test]
    fn box_has_six_groups_in_face_order() {
        let geometry = box_geometry(1.5, 1.5, 1.5);
        assert_indices_in_range(&geometry);
        assert_eq!(geometry.vertex_count(), 24);
        assert_eq!(geometry.groups.len(), 6);
        for (index, group) in geometry.groups.iter().enumerate() {
            assert_eq!(group.material_index, index);
            assert_eq!(group.start, index as u32 * 6);
            assert_eq!(group.count, 6);
        }
        // Group 0 is the +X face.
        let first = geometry.indices[0] as usize;
        assert_eq!(geometry.normals[first], [1.0, 0.0, 0.0]);
        assert!((geometry.positions[first][0] - 0.75).abs() < 1e-6);
        // Group 3 is the -Y face.
        let fourth = geometry.indices[18] as usize;
        assert_eq!(geometry.normals[fourth], [0.0, -1.0, 0.0]);
    }

    #[test]
    fn box_bounds_match_dimensions() {
        let geometry = box_geometry(10.0, 5.0, 3.0);
        let (min, max) = geometry.bounds().unwrap();
        assert_eq!(min, Vec3::new(-5.0, -2.5, -1.5));
        assert_eq!(max, Vec3::new(5.0, 2.5, 1.5));
    }

    #[test]
    fn box_faces_wind_counter_clockwise_outward() {
        let geometry = box_geometry(2.0, 2.0, 2.0);
        for tri in geometry.indices.chunks_exact(3) {
            let a = Vec3::from_array(geometry.positions[tri[0] as usize]);
            let b = Vec3::from_array(geometry.positions[tri[1] as usize]);
            let c = Vec3::from_array(geometry.positions[tri[2] as usize]);
            let face_normal = (b - a).cross(c - a);
            let stored = Vec3::from_array(geometry.normals[tri[0] as usize]);
            assert!(face_normal.dot(stored) > 0.0);
        }
    }

    #[test]
    fn plane_faces_positive_z() {
        let geometry = plane_geometry(60.0, 60.0);
        assert_indices_in_range(&geometry);
        let a = Vec3::from_array(geometry.positions[geometry.indices[0] as usize]);
        let b = Vec3::from_array(geometry.positions[geometry.indices[1] as usize]);
        let c = Vec3::from_array(geometry.positions[geometry.indices[2] as usize]);
        assert!((b - a).cross(c - a).z > 0.0);
        let (min, max) = geometry.bounds().unwrap();
        assert_eq!(min.x, -30.0);
        assert_eq!(max.y, 30.0);
    }

    #[test]
    fn sphere_vertices_sit_on_radius() {
        let geometry = sphere_geometry(0.5, 16, 16);
        assert_indices_in_range(&geometry);
        assert_eq!(geometry.vertex_count(), 17 * 17);
        assert!(geometry
            .positions
            .iter()
            .all(|p| (Vec3::from_array(*p).length() - 0.5).abs() < 1e-5));
        // Pole rows contribute one triangle per segment instead of two.
        assert_eq!(geometry.indices.len(), (16 * 16 * 2 - 2 * 16) * 3);
    }

    #[test]
    fn cone_has_no_top_cap() {
        let geometry = cone_geometry(1.0, 3.0, 32);
        assert_indices_in_range(&geometry);
        let materials: Vec<usize> = geometry.groups.iter().map(|g| g.material_index).collect();
        assert_eq!(materials, vec![0, 2]);
        let (min, max) = geometry.bounds().unwrap();
        assert!((max.y - 1.5).abs() < 1e-6);
        assert!((min.y + 1.5).abs() < 1e-6);
    }

    #[test]
    fn cylinder_groups_cover_every_index() {
        let geometry = cylinder_geometry(0.5, 0.5, 15.0, 32);
        assert_indices_in_range(&geometry);
        assert_eq!(geometry.groups.len(), 3);
        let covered: u32 = geometry.groups.iter().map(|g| g.count).sum();
        assert_eq!(covered, geometry.index_count());
    }

    #[test]
    fn torus_extent_matches_radii() {
        let geometry = torus_geometry(5.0, 2.0, 16, 100);
        assert_indices_in_range(&geometry);
        let (min, max) = geometry.bounds().unwrap();
        assert!((max.x - 7.0).abs() < 1e-4);
        assert!((max.z - 2.0).abs() < 1e-2);
        assert!((min.y + 7.0).abs() < 1e-2);
    }

    #[test]
    fn computed_normals_point_outward_for_box() {
        let mut geometry = box_geometry(1.0, 1.0, 1.0);
        let stored = geometry.normals.clone();
        geometry.compute_vertex_normals();
        for (computed, original) in geometry.normals.iter().zip(stored.iter()) {
            let dot = Vec3::from_array(*computed).dot(Vec3::from_array(*original));
            assert!(dot > 0.99);
        }
    }
}
