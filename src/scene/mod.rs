pub mod geometry;
pub mod light;
pub mod material;
pub mod texture;
pub mod world;

use geometry::{Geometry, GeometryId};
use glam::{EulerRot, Mat4, Quat, Vec3};
use light::Light;
use material::{Color, Material};
use std::sync::Arc;
use texture::{TextureId, TextureStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Local transform; rotation is XYZ Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Self {
            position,
            rotation: Vec3::new(x, y, z),
            scale,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: GeometryId,
    /// One material draws the whole geometry; several are indexed by geometry groups.
    pub materials: Vec<Material>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: GeometryId, material: Material) -> Self {
        Self::with_materials(geometry, vec![material])
    }

    pub fn with_materials(geometry: GeometryId, materials: Vec<Material>) -> Self {
        Self {
            geometry,
            materials,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Unconnected line segments; vertices are consumed in pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSet {
    pub vertices: Vec<LineVertex>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Lines(LineSet),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Color(Color),
    /// Cube map drawn behind everything; `fallback` shows until its faces load.
    CubeTexture { texture: TextureId, fallback: Color },
}

#[derive(Debug)]
pub struct Scene {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    geometries: Vec<Arc<Geometry>>,
    lights: Vec<Light>,
    pub fog: Option<Fog>,
    pub background: Background,
    pub textures: TextureStore,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            geometries: Vec::new(),
            lights: Vec::new(),
            fog: None,
            background: Background::Color(Color::BLACK),
            textures: TextureStore::new(),
        }
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        self.geometries.push(Arc::new(geometry));
        GeometryId(self.geometries.len() - 1)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Arc<Geometry>> {
        self.geometries.get(id.0)
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Adds a node at the root of the scene.
    pub fn add_node(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            transform: Transform::default(),
            visible: true,
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.roots.push(id);
        id
    }

    pub fn add_group(&mut self, name: &str) -> NodeId {
        self.add_node(name, NodeKind::Group)
    }

    pub fn add_mesh(&mut self, name: &str, mesh: Mesh) -> NodeId {
        self.add_node(name, NodeKind::Mesh(mesh))
    }

    /// Moves `child` under `parent`. Returns false for unknown ids or cycles.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent.0 >= self.nodes.len() || child.0 >= self.nodes.len() || parent == child {
            return false;
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return false;
            }
            cursor = self.nodes[id.0].parent;
        }

        match self.nodes[child.0].parent.take() {
            Some(old) => self.nodes[old.0].children.retain(|id| *id != child),
            None => self.roots.retain(|id| *id != child),
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.visible = visible;
        }
    }

    /// Visits `root` and all of its descendants, depth first.
    pub fn traverse_mut<F>(&mut self, root: NodeId, mut visit: F)
    where
        F: FnMut(NodeId, &mut Node),
    {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id.0) else {
                continue;
            };
            visit(id, node);
            stack.extend(node.children.iter().rev().copied());
        }
    }

    pub fn traverse<F>(&self, root: NodeId, mut visit: F)
    where
        F: FnMut(NodeId, &Node),
    {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            visit(id, node);
            stack.extend(node.children.iter().rev().copied());
        }
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(current.0) else {
                break;
            };
            matrix = node.transform.matrix() * matrix;
            cursor = node.parent;
        }
        matrix
    }

    /// Visits every node whose whole ancestor chain is visible, with its world matrix.
    pub fn visit_visible<F>(&self, mut visit: F)
    where
        F: FnMut(NodeId, &Node, Mat4),
    {
        let mut stack: Vec<(NodeId, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|id| (*id, Mat4::IDENTITY))
            .collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.matrix();
            visit(id, node, world);
            stack.extend(node.children.iter().rev().map(|child| (*child, world)));
        }
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }
}
