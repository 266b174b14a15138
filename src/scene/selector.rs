//! Picks the mesh that receives decals.
//!
//! Garment assets often ship several disjoint parts (body, sleeves, trim,
//! buttons). The part with the largest world-space bounding volume is taken
//! to be the main body panel.

use glam::Mat4;

use super::{MeshNode, NodeId, SceneNode};

/// The mesh chosen as the decal canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSelection {
    pub node: NodeId,
    /// Volume of the mesh's world-space bounding box.
    pub volume: f32,
    /// Mesh-local to garment space.
    pub world: Mat4,
}

/// Bounding volume of one mesh under `world`; 0 when no box can be formed.
fn world_volume(world: Mat4, mesh: &MeshNode) -> f32 {
    mesh.mesh
        .bounds()
        .and_then(|b| b.transformed(world))
        .map(|b| b.volume())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Returns the renderable mesh with the strictly largest bounding volume.
///
/// Ties keep the first mesh in traversal order. Meshes without triangles
/// are ignored; `None` means the scene has nothing to project onto.
pub fn select_surface(root: &SceneNode, root_transform: Mat4) -> Option<SurfaceSelection> {
    root.fold(root_transform, None, &mut |best: Option<SurfaceSelection>, world, mesh| {
        if mesh.mesh.triangle_count() == 0 {
            return best;
        }
        let volume = world_volume(world, mesh);
        match best {
            Some(current) if volume <= current.volume => Some(current),
            _ => Some(SurfaceSelection {
                node: mesh.id,
                volume,
                world,
            }),
        }
    })
}

/// `(node, volume)` for every mesh, in traversal order.
pub fn mesh_volumes(root: &SceneNode, root_transform: Mat4) -> Vec<(NodeId, f32)> {
    root.fold(root_transform, Vec::new(), &mut |mut acc, world, mesh| {
        acc.push((mesh.id, world_volume(world, mesh)));
        acc
    })
}
