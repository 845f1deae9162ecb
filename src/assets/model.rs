//! glTF import into plain data that can cross the worker channel, and its
//! instantiation as a node subtree of the scene.

use super::decode::texture_from_image;
use super::AssetError;
use crate::scene::geometry::Geometry;
use crate::scene::material::{Color, Material, Side};
use crate::scene::texture::{TextureData, TextureKind, TextureSettings};
use crate::scene::{Mesh, NodeId, Scene, Transform};
use glam::{Mat4, Vec3};
use image::RgbaImage;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ModelPrimitive {
    pub geometry: usize,
    /// Linear base color factor.
    pub color: [f32; 3],
    pub image: Option<usize>,
    pub double_sided: bool,
}

#[derive(Debug, Clone)]
pub struct ModelNode {
    pub name: String,
    pub local: Mat4,
    pub parent: Option<usize>,
    pub primitives: Vec<ModelPrimitive>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub name: String,
    pub nodes: Vec<ModelNode>,
    pub geometries: Vec<Geometry>,
    pub images: Vec<TextureData>,
}

impl ModelData {
    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().map(|node| node.primitives.len()).sum()
    }
}

pub fn import(path: &Path) -> Result<ModelData, AssetError> {
    let (document, buffers, images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: path.display().to_string(),
        source,
    })?;

    let mut model = ModelData {
        name: path
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("model")
            .to_string(),
        ..ModelData::default()
    };
    model.images = images.into_iter().map(image_to_texture).collect();

    let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        return Err(AssetError::EmptyModel {
            path: path.display().to_string(),
        });
    };

    let mut stack: Vec<(gltf::Node, Option<usize>)> =
        scene.nodes().map(|node| (node, None)).collect();
    stack.reverse();
    while let Some((node, parent)) = stack.pop() {
        let index = model.nodes.len();
        let mut primitives = Vec::new();
        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::debug!("Skipping non-triangle primitive in {}", model.name);
                    continue;
                }
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
                let Some(positions) = reader.read_positions() else {
                    continue;
                };
                let mut geometry = Geometry {
                    positions: positions.collect(),
                    ..Geometry::default()
                };
                geometry.indices = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..geometry.positions.len() as u32).collect(),
                };
                geometry.uvs = match reader.read_tex_coords(0) {
                    Some(uvs) => uvs.into_f32().collect(),
                    None => vec![[0.0, 0.0]; geometry.positions.len()],
                };
                match reader.read_normals() {
                    Some(normals) => geometry.normals = normals.collect(),
                    None => geometry.compute_vertex_normals(),
                }

                let material = primitive.material();
                let pbr = material.pbr_metallic_roughness();
                let [r, g, b, _] = pbr.base_color_factor();
                model.geometries.push(geometry);
                primitives.push(ModelPrimitive {
                    geometry: model.geometries.len() - 1,
                    color: [r, g, b],
                    image: pbr
                        .base_color_texture()
                        .map(|info| info.texture().source().index()),
                    double_sided: material.double_sided(),
                });
            }
        }
        model.nodes.push(ModelNode {
            name: node.name().unwrap_or("node").to_string(),
            local: Mat4::from_cols_array_2d(&node.transform().matrix()),
            parent,
            primitives,
        });
        let children: Vec<_> = node.children().collect();
        for child in children.into_iter().rev() {
            stack.push((child, Some(index)));
        }
    }

    if model.mesh_count() == 0 {
        return Err(AssetError::EmptyModel {
            path: path.display().to_string(),
        });
    }
    Ok(model)
}

fn image_to_texture(data: gltf::image::Data) -> TextureData {
    use gltf::image::Format;
    let channels = match data.format {
        Format::R8 => 1,
        Format::R8G8 => 2,
        Format::R8G8B8 => 3,
        Format::R8G8B8A8 => 4,
        other => {
            log::warn!("Unsupported glTF image format {other:?}; using white");
            return TextureData::solid([255, 255, 255, 255]);
        }
    };
    let mut rgba = Vec::with_capacity((data.width * data.height * 4) as usize);
    for texel in data.pixels.chunks_exact(channels) {
        match channels {
            1 => rgba.extend_from_slice(&[texel[0], texel[0], texel[0], 255]),
            2 => rgba.extend_from_slice(&[texel[0], texel[0], texel[0], texel[1]]),
            3 => rgba.extend_from_slice(&[texel[0], texel[1], texel[2], 255]),
            _ => rgba.extend_from_slice(texel),
        }
    }
    match RgbaImage::from_raw(data.width, data.height, rgba) {
        Some(image) => texture_from_image(image, true),
        None => TextureData::solid([255, 255, 255, 255]),
    }
}

/// Adds the model under a new root group and returns that group.
pub fn instantiate(scene: &mut Scene, model: ModelData) -> NodeId {
    let root = scene.add_group(&model.name);
    let textures: Vec<_> = model
        .images
        .into_iter()
        .enumerate()
        .map(|(index, data)| {
            scene.textures.insert_ready(
                &format!("{}#{index}", model.name),
                TextureKind::Flat,
                TextureSettings::srgb(),
                data,
            )
        })
        .collect();
    let geometries: Vec<_> = model
        .geometries
        .into_iter()
        .map(|geometry| scene.add_geometry(geometry))
        .collect();

    let mut ids: Vec<NodeId> = Vec::with_capacity(model.nodes.len());
    for node in &model.nodes {
        let id = scene.add_group(&node.name);
        if let Some(n) = scene.node_mut(id) {
            n.transform = Transform::from_matrix(node.local);
        }
        let parent = node.parent.and_then(|index| ids.get(index).copied()).unwrap_or(root);
        scene.attach(parent, id);

        for (index, primitive) in node.primitives.iter().enumerate() {
            let Some(geometry) = geometries.get(primitive.geometry).copied() else {
                continue;
            };
            let material = Material {
                color: Color(Vec3::from_array(primitive.color)),
                map: primitive.image.and_then(|image| textures.get(image).copied()),
                side: if primitive.double_sided {
                    Side::Double
                } else {
                    Side::Front
                },
            };
            let mesh = scene.add_mesh(&format!("{}.{index}", node.name), Mesh::new(geometry, material));
            scene.attach(id, mesh);
        }
        ids.push(id);
    }
    root
}

#[cfg(test)]
mod tests {
    use super::{instantiate, ModelData, ModelNode, ModelPrimitive};
    use crate::scene::geometry::box_geometry;
    use crate::scene::texture::TextureData;
    use crate::scene::{NodeKind, Scene};
    use glam::{Mat4, Vec3};

    fn two_level_model() -> ModelData {
        ModelData {
            name: "bunny".to_string(),
            nodes: vec![
                ModelNode {
                    name: "body".to_string(),
                    local: Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
                    parent: None,
                    primitives: vec![ModelPrimitive {
                        geometry: 0,
                        color: [1.0, 1.0, 1.0],
                        image: Some(0),
                        double_sided: false,
                    }],
                },
                ModelNode {
                    name: "ear".to_string(),
                    local: Mat4::IDENTITY,
                    parent: Some(0),
                    primitives: vec![
                        ModelPrimitive {
                            geometry: 0,
                            color: [0.5, 0.5, 0.5],
                            image: None,
                            double_sided: true,
                        },
                        ModelPrimitive {
                            geometry: 1,
                            color: [0.2, 0.2, 0.2],
                            image: None,
                            double_sided: false,
                        },
                    ],
                },
            ],
            geometries: vec![box_geometry(1.0, 1.0, 1.0), box_geometry(0.2, 0.2, 0.2)],
            images: vec![TextureData::solid([255, 0, 0, 255])],
        }
    }

    #[test]
    fn instantiate_builds_hierarchy_under_one_root() {
        let mut scene = Scene::new();
        let model = two_level_model();
        assert_eq!(model.mesh_count(), 3);
        let root = instantiate(&mut scene, model);

        assert_eq!(scene.roots(), &[root]);
        let mut meshes = 0;
        scene.traverse(root, |_, node| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                meshes += 1;
                if let Some(map) = mesh.materials[0].map {
                    assert!(scene.textures.get(map).unwrap().is_ready());
                }
            }
        });
        assert_eq!(meshes, 3);
        assert_eq!(scene.geometry_count(), 2);

        let ear = scene.find_by_name("ear").unwrap();
        let origin = scene.world_matrix(ear).transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
    }
}
