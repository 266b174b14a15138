//! glTF / GLB import.

use std::path::Path;

use glam::{Mat4, Vec3};
use tracing::{debug, warn};

use super::{GroupNode, MeshData, MeshNode, NodeId, SceneNode};
use crate::error::{Result, StudioError};

/// Reads and parses a mesh asset from disk.
pub fn load_path(path: &Path) -> Result<SceneNode> {
    let bytes = std::fs::read(path).map_err(|source| StudioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_glb(&bytes).map_err(|e| match e {
        StudioError::EmptyAsset(_) => StudioError::EmptyAsset(path.display().to_string()),
        other => other,
    })
}

/// Parses a binary (`.glb`) or embedded JSON (`.gltf`) asset.
///
/// The default scene (or the first one) becomes a group root with id 0.
/// A glTF mesh with several primitives becomes a group holding one mesh node
/// per triangle primitive.
pub fn load_glb(bytes: &[u8]) -> Result<SceneNode> {
    let (document, buffers, _images) = ::gltf::import_slice(bytes)?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| StudioError::EmptyAsset("<memory>".to_string()))?;

    let mut builder = Builder {
        buffers: &buffers,
        next_id: 0,
    };
    let root_id = builder.next();
    let children = scene.nodes().map(|node| builder.node(&node)).collect();
    let root = SceneNode::Group(GroupNode {
        id: root_id,
        name: scene.name().map(str::to_string),
        transform: Mat4::IDENTITY,
        children,
    });

    let meshes = root.mesh_count();
    if meshes == 0 {
        warn!("asset contains no triangle meshes");
    }
    debug!(nodes = builder.next_id, meshes, "imported glTF scene");
    Ok(root)
}

struct Builder<'a> {
    buffers: &'a [::gltf::buffer::Data],
    next_id: u32,
}

impl Builder<'_> {
    fn next(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn node(&mut self, node: &::gltf::Node) -> SceneNode {
        let id = self.next();
        let name = node.name().map(str::to_string);
        let transform = Mat4::from_cols_array_2d(&node.transform().matrix());

        let mut parts: Vec<SceneNode> = node
            .mesh()
            .map(|mesh| self.primitives(&mesh))
            .unwrap_or_default();
        let children: Vec<SceneNode> = node.children().map(|child| self.node(&child)).collect();

        // A lone primitive with no children collapses into the node itself.
        if children.is_empty() && parts.len() == 1 {
            if let Some(SceneNode::Mesh(mut mesh)) = parts.pop() {
                mesh.id = id;
                mesh.name = name;
                mesh.transform = transform;
                return SceneNode::Mesh(mesh);
            }
        }

        parts.extend(children);
        SceneNode::Group(GroupNode {
            id,
            name,
            transform,
            children: parts,
        })
    }

    fn primitives(&mut self, mesh: &::gltf::Mesh) -> Vec<SceneNode> {
        let buffers = self.buffers;
        let mut out = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != ::gltf::mesh::Mode::Triangles {
                debug!(mode = ?primitive.mode(), "skipping non-triangle primitive");
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let data = match reader.read_normals() {
                Some(normals) => {
                    MeshData::with_normals(positions, normals.map(Vec3::from).collect(), indices)
                }
                None => MeshData::new(positions, indices),
            };

            out.push(SceneNode::Mesh(MeshNode {
                id: self.next(),
                name: mesh.name().map(str::to_string),
                transform: Mat4::IDENTITY,
                mesh: data.into(),
            }));
        }
        out
    }
}
