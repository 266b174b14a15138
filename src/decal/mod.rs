//! Per-layer decal projection onto the selected garment surface.
//!
//! [`DecalProjector`] memoizes each layer's projected geometry. A projection
//! is recomputed only when the layer's revision, its texture key or the
//! surface generation differs from the cached entry.

mod clip;

pub use clip::{DecalMesh, ReferencePlane, project_decal};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::Mat4;
use tracing::{debug, trace};

use crate::layer::{Layer, LayerId, Side};
use crate::raster::{DecalTexture, TextureKey};
use crate::scene::{MeshData, NodeId, SceneNode, select_surface};

// ============================================================================
// Surface
// ============================================================================

/// The mesh that decals are projected onto.
#[derive(Debug, Clone)]
pub struct Surface {
    /// Changes whenever a different garment (or reload) supplies the mesh.
    pub generation: u64,
    pub node: NodeId,
    pub mesh: Arc<MeshData>,
    /// Mesh-local to garment space.
    pub mesh_to_garment: Mat4,
}

impl Surface {
    /// Runs surface selection over a loaded scene.
    ///
    /// Returns `None` when the scene has no renderable mesh.
    pub fn resolve(root: &SceneNode, root_transform: Mat4, generation: u64) -> Option<Self> {
        let selection = select_surface(root, root_transform)?;
        let (world, node) = root.find_mesh(selection.node, root_transform)?;
        debug!(
            node = %selection.node,
            volume = selection.volume,
            generation,
            "selected decal surface"
        );
        Some(Self {
            generation,
            node: node.id,
            mesh: node.mesh.clone(),
            mesh_to_garment: world,
        })
    }

    /// Converts a garment-space layer transform into mesh-local space.
    pub fn projector_for(&self, layer: &Layer) -> Mat4 {
        self.mesh_to_garment.inverse() * layer.transform().to_matrix()
    }
}

// ============================================================================
// DecalPatch
// ============================================================================

/// One layer's projected decal, ready to draw.
#[derive(Debug, Clone)]
pub struct DecalPatch {
    pub layer_id: LayerId,
    pub side: Side,
    /// Mesh node the geometry belongs to.
    pub target: NodeId,
    /// Geometry in the target mesh's local space.
    pub mesh: Arc<DecalMesh>,
    pub mesh_to_garment: Mat4,
    pub plane: Option<ReferencePlane>,
    pub texture: Arc<DecalTexture>,
}

// ============================================================================
// DecalProjector
// ============================================================================

struct Projection {
    revision: u64,
    texture: TextureKey,
    surface: u64,
    projector: Mat4,
    mesh: Arc<DecalMesh>,
}

/// Projects layers onto a [`Surface`], reusing unchanged projections.
pub struct DecalProjector {
    reference_planes: bool,
    cache: HashMap<LayerId, Projection>,
    computed: u64,
}

impl DecalProjector {
    pub fn new(reference_planes: bool) -> Self {
        Self {
            reference_planes,
            cache: HashMap::new(),
            computed: 0,
        }
    }

    pub fn reference_planes(&self) -> bool {
        self.reference_planes
    }

    pub fn set_reference_planes(&mut self, enabled: bool) {
        self.reference_planes = enabled;
    }

    /// Number of projections actually computed (cache misses).
    pub fn computed(&self) -> u64 {
        self.computed
    }

    pub fn project(
        &mut self,
        layer: &Layer,
        texture: Arc<DecalTexture>,
        surface: &Surface,
    ) -> DecalPatch {
        let key = layer.texture_key();
        let fresh = self.cache.get(&layer.id()).is_some_and(|p| {
            p.revision == layer.revision() && p.texture == key && p.surface == surface.generation
        });

        if !fresh {
            let projector = surface.projector_for(layer);
            let mesh = Arc::new(project_decal(&surface.mesh, projector));
            trace!(
                layer = %layer.id(),
                triangles = mesh.triangle_count(),
                "projected decal"
            );
            self.computed += 1;
            self.cache.insert(
                layer.id(),
                Projection {
                    revision: layer.revision(),
                    texture: key,
                    surface: surface.generation,
                    projector,
                    mesh,
                },
            );
        }

        let projection = &self.cache[&layer.id()];
        DecalPatch {
            layer_id: layer.id(),
            side: layer.side(),
            target: surface.node,
            mesh: projection.mesh.clone(),
            mesh_to_garment: surface.mesh_to_garment,
            plane: self
                .reference_planes
                .then(|| ReferencePlane::new(projection.projector)),
            texture,
        }
    }

    /// Forgets projections of layers that no longer exist.
    pub fn retain_layers(&mut self, live: &HashSet<LayerId>) {
        self.cache.retain(|id, _| live.contains(id));
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BaseColor;
    use crate::layer::{LayerField, LayerStack};
    use crate::scene::box_mesh;
    use glam::Vec3;
    use image::RgbaImage;

    fn torso() -> SceneNode {
        SceneNode::group(
            NodeId::new(0),
            Mat4::IDENTITY,
            vec![
                SceneNode::mesh(NodeId::new(1), Mat4::IDENTITY, box_mesh(Vec3::new(0.6, 0.7, 0.25))),
                SceneNode::mesh(NodeId::new(2), Mat4::IDENTITY, box_mesh(Vec3::splat(0.05))),
            ],
        )
    }

    fn texture() -> Arc<DecalTexture> {
        Arc::new(DecalTexture::from_image(RgbaImage::new(4, 2)))
    }

    #[test]
    fn resolve_picks_the_body_panel() {
        let surface = Surface::resolve(&torso(), Mat4::IDENTITY, 1).unwrap();
        assert_eq!(surface.node, NodeId::new(1));
        let empty = SceneNode::group(NodeId::new(0), Mat4::IDENTITY, Vec::new());
        assert!(Surface::resolve(&empty, Mat4::IDENTITY, 1).is_none());
    }

    #[test]
    fn front_and_back_layers_land_on_their_panels() {
        let surface = Surface::resolve(&torso(), Mat4::IDENTITY, 1).unwrap();
        let mut stack = LayerStack::default();
        let front = stack.add_text("F", "serif", BaseColor::BLACK, Side::Front).unwrap();
        let back = stack.add_text("B", "serif", BaseColor::BLACK, Side::Back).unwrap();

        let mut projector = DecalProjector::new(false);
        let f = projector.project(stack.get(front).unwrap(), texture(), &surface);
        let b = projector.project(stack.get(back).unwrap(), texture(), &surface);

        assert!(!f.mesh.is_empty());
        assert!(!b.mesh.is_empty());
        assert!(f.mesh.positions.iter().all(|p| p.z > 0.0));
        assert!(b.mesh.positions.iter().all(|p| p.z < 0.0));
        assert!(f.plane.is_none());
    }

    #[test]
    fn unchanged_layers_reuse_their_projection() {
        let surface = Surface::resolve(&torso(), Mat4::IDENTITY, 1).unwrap();
        let mut stack = LayerStack::default();
        let id = stack.add_text("Hi", "serif", BaseColor::BLACK, Side::Front).unwrap();
        let mut projector = DecalProjector::new(false);

        let first = projector.project(stack.get(id).unwrap(), texture(), &surface);
        let second = projector.project(stack.get(id).unwrap(), texture(), &surface);
        assert!(Arc::ptr_eq(&first.mesh, &second.mesh));
        assert_eq!(projector.computed(), 1);

        stack.update(id, LayerField::X, 0.1);
        projector.project(stack.get(id).unwrap(), texture(), &surface);
        assert_eq!(projector.computed(), 2);

        stack.update_text(id, "Hey", "serif", BaseColor::BLACK);
        projector.project(stack.get(id).unwrap(), texture(), &surface);
        assert_eq!(projector.computed(), 3);

        let reloaded = Surface::resolve(&torso(), Mat4::IDENTITY, 2).unwrap();
        projector.project(stack.get(id).unwrap(), texture(), &reloaded);
        assert_eq!(projector.computed(), 4);
    }

    #[test]
    fn reference_plane_is_optional() {
        let surface = Surface::resolve(&torso(), Mat4::IDENTITY, 1).unwrap();
        let mut stack = LayerStack::default();
        let id = stack.add_text("Hi", "serif", BaseColor::BLACK, Side::Front).unwrap();

        let mut projector = DecalProjector::new(true);
        let patch = projector.project(stack.get(id).unwrap(), texture(), &surface);
        let plane = patch.plane.unwrap();
        assert!((plane.normal - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn normalization_is_undone_in_mesh_space() {
        let root = SceneNode::mesh(NodeId::new(0), Mat4::IDENTITY, box_mesh(Vec3::new(60.0, 70.0, 25.0)));
        let surface = Surface::resolve(&root, Mat4::from_scale(Vec3::splat(0.01)), 1).unwrap();
        let mut stack = LayerStack::default();
        let id = stack.add_text("Hi", "serif", BaseColor::BLACK, Side::Front).unwrap();

        let patch = DecalProjector::new(false).project(stack.get(id).unwrap(), texture(), &surface);
        assert!(!patch.mesh.is_empty());
        // Front panel of the unscaled box sits at z = 12.5 in mesh space.
        assert!(patch.mesh.positions.iter().all(|p| (p.z - 12.5).abs() < 1e-3));
    }

    #[test]
    fn retain_drops_deleted_layers() {
        let surface = Surface::resolve(&torso(), Mat4::IDENTITY, 1).unwrap();
        let mut stack = LayerStack::default();
        let a = stack.add_text("a", "serif", BaseColor::BLACK, Side::Front).unwrap();
        let b = stack.add_text("b", "serif", BaseColor::BLACK, Side::Front).unwrap();
        let mut projector = DecalProjector::new(false);
        for id in [a, b] {
            projector.project(stack.get(id).unwrap(), texture(), &surface);
        }

        projector.retain_layers(&HashSet::from([b]));
        assert_eq!(projector.len(), 1);
    }
}
