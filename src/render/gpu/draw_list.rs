use super::uniforms::ObjectUniforms;
use crate::scene::geometry::GeometryId;
use crate::scene::material::{Material, Side};
use crate::scene::texture::TextureId;
use crate::scene::{LineSet, LineVertex, Mesh, NodeKind, Scene};
use glam::Mat4;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct MeshDraw {
    /// Index into `DrawList::objects`.
    pub object: u32,
    pub geometry: GeometryId,
    /// Index range to draw; `None` draws the whole geometry.
    pub indices: Option<Range<u32>>,
    pub map: Option<TextureId>,
    pub double_sided: bool,
    pub cast_shadow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineDraw {
    pub object: u32,
    /// Range into `DrawList::line_vertices`.
    pub vertices: Range<u32>,
}

/// Everything visible this frame, flattened in scene order.
#[derive(Debug, Default)]
pub struct DrawList {
    pub objects: Vec<ObjectUniforms>,
    pub meshes: Vec<MeshDraw>,
    pub lines: Vec<LineDraw>,
    pub line_vertices: Vec<LineVertex>,
}

impl DrawList {
    pub fn collect(scene: &Scene) -> Self {
        let mut list = Self::default();
        scene.visit_visible(|_, node, world| match &node.kind {
            NodeKind::Group => {}
            NodeKind::Mesh(mesh) => list.push_mesh(scene, mesh, world),
            NodeKind::Lines(lines) => list.push_lines(lines, world),
        });
        list
    }

    pub fn shadow_casters(&self) -> impl Iterator<Item = &MeshDraw> {
        self.meshes.iter().filter(|draw| draw.cast_shadow)
    }

    fn push_mesh(&mut self, scene: &Scene, mesh: &Mesh, world: Mat4) {
        let Some(geometry) = scene.geometry(mesh.geometry) else {
            return;
        };
        if geometry.index_count() == 0 {
            return;
        }
        match mesh.materials.as_slice() {
            [] => {}
            [material] => self.push_part(scene, mesh, material, world, None),
            materials => {
                for group in &geometry.groups {
                    let Some(material) = materials.get(group.material_index) else {
                        continue;
                    };
                    let range = group.start..group.start + group.count;
                    self.push_part(scene, mesh, material, world, Some(range));
                }
            }
        }
    }

    fn push_part(
        &mut self,
        scene: &Scene,
        mesh: &Mesh,
        material: &Material,
        world: Mat4,
        indices: Option<Range<u32>>,
    ) {
        let repeat = material
            .map
            .and_then(|id| scene.textures.get(id))
            .map(|slot| slot.settings.repeat.to_array())
            .unwrap_or([1.0, 1.0]);
        let object = self.objects.len() as u32;
        self.objects
            .push(ObjectUniforms::new(world, material, repeat, mesh.receive_shadow));
        self.meshes.push(MeshDraw {
            object,
            geometry: mesh.geometry,
            indices,
            map: material.map,
            double_sided: material.side == Side::Double,
            cast_shadow: mesh.cast_shadow,
        });
    }

    fn push_lines(&mut self, lines: &LineSet, world: Mat4) {
        let count = lines.vertices.len() - lines.vertices.len() % 2;
        if count == 0 {
            return;
        }
        let start = self.line_vertices.len() as u32;
        self.line_vertices.extend_from_slice(&lines.vertices[..count]);
        let object = self.objects.len() as u32;
        self.objects.push(ObjectUniforms::lines(world));
        self.lines.push(LineDraw {
            object,
            vertices: start..start + count as u32,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::DrawList;
    use crate::scene::geometry::{box_geometry, plane_geometry};
    use crate::scene::material::{Color, Material};
    use crate::scene::texture::{TextureKind, TextureSettings};
    use crate::scene::{LineSet, LineVertex, Mesh, NodeKind, Scene};
    use glam::Vec2;

    #[test]
    fn multi_material_box_draws_one_part_per_face() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(box_geometry(1.5, 1.5, 1.5));
        let materials = (0..6)
            .map(|index| Material::colored(Color::from_hex(0x101010 * (index + 1))))
            .collect();
        let mut mesh = Mesh::with_materials(geometry, materials);
        mesh.cast_shadow = true;
        scene.add_mesh("cube", mesh);

        let list = DrawList::collect(&scene);
        assert_eq!(list.meshes.len(), 6);
        assert_eq!(list.objects.len(), 6);
        assert!(list.meshes.iter().all(|draw| draw.indices.is_some()));
        assert_eq!(list.shadow_casters().count(), 6);
        let first = list.meshes[0].indices.clone().unwrap();
        assert_eq!(first, 0..6);
    }

    #[test]
    fn missing_group_materials_are_skipped() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(box_geometry(1.0, 1.0, 1.0));
        let materials = vec![Material::default(), Material::default()];
        scene.add_mesh("partial", Mesh::with_materials(geometry, materials));
        let list = DrawList::collect(&scene);
        assert_eq!(list.meshes.len(), 2);
    }

    #[test]
    fn single_material_draws_whole_geometry_with_texture_repeat() {
        let mut scene = Scene::new();
        let mut settings = TextureSettings::srgb();
        settings.repeat = Vec2::splat(30.0);
        let grass = scene
            .textures
            .reserve("grass", TextureKind::Flat, settings);
        let geometry = scene.add_geometry(plane_geometry(60.0, 60.0));
        let mut ground = Mesh::new(geometry, Material::textured(grass).double_sided());
        ground.receive_shadow = true;
        scene.add_mesh("ground", ground);

        let list = DrawList::collect(&scene);
        assert_eq!(list.meshes.len(), 1);
        let draw = &list.meshes[0];
        assert_eq!(draw.indices, None);
        assert!(draw.double_sided);
        assert!(!draw.cast_shadow);
        assert_eq!(draw.map, Some(grass));
        let object = &list.objects[draw.object as usize];
        assert_eq!(object.uv_transform[..2], [30.0, 30.0]);
        assert_eq!(object.flags[0], 1.0);
    }

    #[test]
    fn hidden_lines_are_not_drawn() {
        let mut scene = Scene::new();
        let vertex = LineVertex {
            position: [0.0; 3],
            color: [1.0; 3],
        };
        let helper = scene.add_node(
            "helper",
            NodeKind::Lines(LineSet {
                vertices: vec![vertex; 4],
            }),
        );
        let list = DrawList::collect(&scene);
        assert_eq!(list.lines.len(), 1);
        assert_eq!(list.lines[0].vertices, 0..4);
        assert_eq!(list.line_vertices.len(), 4);

        scene.set_visible(helper, false);
        let list = DrawList::collect(&scene);
        assert!(list.lines.is_empty());
        assert!(list.objects.is_empty());
    }
}
