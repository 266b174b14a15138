//! Garment scene graph.
//!
//! Loaded assets become a tree of [`SceneNode`]s. Mesh data is shared
//! behind an [`Arc`] so cloning a scene (or handing it to a frame) is cheap.

mod aabb;
pub mod import;
pub mod selector;

pub use aabb::Aabb;
pub use selector::{SurfaceSelection, mesh_volumes, select_surface};

use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec3};

// ============================================================================
// NodeId
// ============================================================================

/// Identifies a node within one loaded scene (pre-order index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// MeshData
// ============================================================================

/// Indexed triangle geometry in mesh-local space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Builds a mesh, deriving smooth vertex normals from the faces.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let normals = vertex_normals(&positions, &indices);
        Self {
            positions,
            normals,
            indices,
        }
    }

    /// Builds a mesh with authored normals, falling back to derived ones
    /// when the counts disagree.
    pub fn with_normals(positions: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> Self {
        if normals.len() != positions.len() {
            return Self::new(positions, indices);
        }
        Self {
            positions,
            normals,
            indices,
        }
    }

    /// Triangles whose indices are all in range.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        let count = self.positions.len() as u32;
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .filter(move |t| t.iter().all(|&i| i < count))
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles().count()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions.iter().copied())
    }
}

fn vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for t in indices.chunks_exact(3) {
        let [a, b, c] = [t[0] as usize, t[1] as usize, t[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        // Area-weighted: the unnormalized cross product.
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Z))
        .collect()
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone)]
pub struct MeshNode {
    pub id: NodeId,
    pub name: Option<String>,
    /// Transform relative to the parent node.
    pub transform: Mat4,
    pub mesh: Arc<MeshData>,
}

#[derive(Debug, Clone)]
pub struct GroupNode {
    pub id: NodeId,
    pub name: Option<String>,
    pub transform: Mat4,
    pub children: Vec<SceneNode>,
}

/// A node of a loaded garment scene.
#[derive(Debug, Clone)]
pub enum SceneNode {
    Mesh(MeshNode),
    Group(GroupNode),
}

impl SceneNode {
    pub fn mesh(id: NodeId, transform: Mat4, mesh: MeshData) -> Self {
        SceneNode::Mesh(MeshNode {
            id,
            name: None,
            transform,
            mesh: Arc::new(mesh),
        })
    }

    pub fn group(id: NodeId, transform: Mat4, children: Vec<SceneNode>) -> Self {
        SceneNode::Group(GroupNode {
            id,
            name: None,
            transform,
            children,
        })
    }

    pub fn id(&self) -> NodeId {
        match self {
            SceneNode::Mesh(m) => m.id,
            SceneNode::Group(g) => g.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            SceneNode::Mesh(m) => m.name.as_deref(),
            SceneNode::Group(g) => g.name.as_deref(),
        }
    }

    pub fn transform(&self) -> Mat4 {
        match self {
            SceneNode::Mesh(m) => m.transform,
            SceneNode::Group(g) => g.transform,
        }
    }

    /// Folds over every mesh node in depth-first pre-order.
    ///
    /// `f` receives the mesh's world transform (`parent` composed with every
    /// local transform down to and including the mesh).
    pub fn fold<A>(&self, parent: Mat4, init: A, f: &mut impl FnMut(A, Mat4, &MeshNode) -> A) -> A {
        let world = parent * self.transform();
        match self {
            SceneNode::Mesh(mesh) => f(init, world, mesh),
            SceneNode::Group(group) => group
                .children
                .iter()
                .fold(init, |acc, child| child.fold(world, acc, f)),
        }
    }

    /// Every mesh node with its world transform, in traversal order.
    pub fn meshes(&self, parent: Mat4) -> Vec<(Mat4, &MeshNode)> {
        let mut out = Vec::new();
        self.collect_meshes(parent, &mut out);
        out
    }

    fn collect_meshes<'a>(&'a self, parent: Mat4, out: &mut Vec<(Mat4, &'a MeshNode)>) {
        let world = parent * self.transform();
        match self {
            SceneNode::Mesh(mesh) => out.push((world, mesh)),
            SceneNode::Group(group) => {
                for child in &group.children {
                    child.collect_meshes(world, out);
                }
            }
        }
    }

    /// Looks up a mesh node by id, returning it with its world transform.
    pub fn find_mesh(&self, id: NodeId, parent: Mat4) -> Option<(Mat4, &MeshNode)> {
        self.meshes(parent).into_iter().find(|(_, m)| m.id == id)
    }

    pub fn mesh_count(&self) -> usize {
        self.fold(Mat4::IDENTITY, 0, &mut |n, _, _| n + 1)
    }

    /// World-space bounds of all geometry under this node.
    pub fn bounds(&self, parent: Mat4) -> Option<Aabb> {
        self.fold(parent, None, &mut |acc: Option<Aabb>, world, mesh| {
            let Some(b) = mesh.mesh.bounds().and_then(|b| b.transformed(world)) else {
                return acc;
            };
            Some(match acc {
                Some(a) => a.union(&b),
                None => b,
            })
        })
    }
}

/// A unit quad in the XY plane facing +Z.
#[cfg(test)]
pub(crate) fn quad_mesh(half: f32) -> MeshData {
    MeshData::new(
        vec![
            Vec3::new(-half, -half, 0.0),
            Vec3::new(half, -half, 0.0),
            Vec3::new(half, half, 0.0),
            Vec3::new(-half, half, 0.0),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
}

/// An axis-aligned box centered at the origin.
#[cfg(test)]
pub(crate) fn box_mesh(size: Vec3) -> MeshData {
    let h = size * 0.5;
    let positions = Aabb::new(-h, h).corners().to_vec();
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    MeshData::new(positions, indices)
}
