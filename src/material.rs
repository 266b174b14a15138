//! Garment materials and base color transitions.
//!
//! Every mesh node of the active garment gets one [`Material`] in a
//! [`MaterialArena`]. The arena is rebuilt when the garment changes; a color
//! change only moves the [`MaterialSynchronizer`]'s target, and each frame
//! [`tick`](MaterialSynchronizer::tick) eases every material toward it.

use std::collections::HashMap;

use glam::Mat4;
use palette::LinSrgb;
use tracing::debug;

use crate::color::{BaseColor, next_color, to_rgba};
use crate::scene::{NodeId, SceneNode};

pub const ROUGHNESS: f32 = 0.5;
pub const METALNESS: f32 = 0.1;

/// Index of a material in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub node: NodeId,
    pub color: LinSrgb,
    pub roughness: f32,
    pub metalness: f32,
}

impl Material {
    pub fn rgba(&self) -> [f32; 4] {
        to_rgba(self.color)
    }
}

// ============================================================================
// MaterialArena
// ============================================================================

/// Materials of the active garment, keyed by mesh node.
#[derive(Debug, Default)]
pub struct MaterialArena {
    materials: Vec<Material>,
    by_node: HashMap<NodeId, MaterialHandle>,
    generation: u64,
}

impl MaterialArena {
    /// Replaces every material with one fresh material per mesh node.
    pub fn rebuild(&mut self, root: &SceneNode, color: LinSrgb, generation: u64) {
        self.clear();
        self.generation = generation;
        for (_, mesh) in root.meshes(Mat4::IDENTITY) {
            let handle = MaterialHandle(self.materials.len());
            self.materials.push(Material {
                node: mesh.id,
                color,
                roughness: ROUGHNESS,
                metalness: METALNESS,
            });
            self.by_node.insert(mesh.id, handle);
        }
        debug!(materials = self.materials.len(), generation, "rebuilt garment materials");
    }

    pub fn clear(&mut self) {
        self.materials.clear();
        self.by_node.clear();
    }

    pub fn handle(&self, node: NodeId) -> Option<MaterialHandle> {
        self.by_node.get(&node).copied()
    }

    pub fn get(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.0)
    }

    pub fn for_node(&self, node: NodeId) -> Option<&Material> {
        self.handle(node).and_then(|h| self.get(h))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    /// Garment generation the arena was built for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

// ============================================================================
// MaterialSynchronizer
// ============================================================================

/// Eases the garment's base color toward the selected target.
#[derive(Debug)]
pub struct MaterialSynchronizer {
    arena: MaterialArena,
    current: LinSrgb,
    target: BaseColor,
    rate: f32,
}

impl MaterialSynchronizer {
    pub fn new(initial: BaseColor, rate: f32) -> Self {
        Self {
            arena: MaterialArena::default(),
            current: initial.to_linear(),
            target: initial,
            rate,
        }
    }

    pub fn arena(&self) -> &MaterialArena {
        &self.arena
    }

    pub fn target(&self) -> BaseColor {
        self.target
    }

    /// The color materials currently show.
    pub fn current(&self) -> LinSrgb {
        self.current
    }

    /// Moves the target. Materials are left untouched until the next tick.
    pub fn set_target(&mut self, color: BaseColor) -> bool {
        if self.target == color {
            return false;
        }
        self.target = color;
        true
    }

    /// Rebuilds materials for a newly loaded garment, seeded with the color
    /// currently on screen so the tint keeps easing instead of jumping.
    pub fn rebuild(&mut self, root: &SceneNode, generation: u64) {
        self.arena.rebuild(root, self.current, generation);
    }

    pub fn clear(&mut self) {
        self.arena.clear();
    }

    /// Advances every material by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.current = next_color(self.current, self.target.to_linear(), dt, self.rate);
        for material in &mut self.arena.materials {
            material.color = self.current;
        }
    }

    /// True once the displayed color is within `epsilon` of the target on
    /// every channel.
    pub fn is_settled(&self, epsilon: f32) -> bool {
        let t = self.target.to_linear();
        (self.current.red - t.red).abs() <= epsilon
            && (self.current.green - t.green).abs() <= epsilon
            && (self.current.blue - t.blue).abs() <= epsilon
    }

    /// `(node, rgba)` for every material, for upload to the renderer.
    pub fn colors(&self) -> Vec<(NodeId, [f32; 4])> {
        self.arena.iter().map(|m| (m.node, m.rgba())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{box_mesh, quad_mesh};
    use glam::Vec3;

    fn garment() -> SceneNode {
        SceneNode::group(
            NodeId::new(0),
            Mat4::IDENTITY,
            vec![
                SceneNode::mesh(NodeId::new(1), Mat4::IDENTITY, box_mesh(Vec3::ONE)),
                SceneNode::mesh(NodeId::new(2), Mat4::IDENTITY, quad_mesh(0.2)),
            ],
        )
    }

    #[test]
    fn arena_has_one_material_per_mesh() {
        let mut arena = MaterialArena::default();
        arena.rebuild(&garment(), BaseColor::WHITE.to_linear(), 3);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.generation(), 3);

        let body = arena.for_node(NodeId::new(1)).unwrap();
        assert_eq!(body.roughness, ROUGHNESS);
        assert_eq!(body.metalness, METALNESS);
        assert!(arena.for_node(NodeId::new(0)).is_none());
    }

    #[test]
    fn target_change_does_not_recreate_materials() {
        let mut sync = MaterialSynchronizer::new(BaseColor::WHITE, 4.0);
        sync.rebuild(&garment(), 1);
        let handle = sync.arena().handle(NodeId::new(1)).unwrap();

        assert!(sync.set_target(BaseColor::BLACK));
        assert!(!sync.set_target(BaseColor::BLACK));
        assert_eq!(sync.arena().handle(NodeId::new(1)), Some(handle));
        assert_eq!(sync.arena().get(handle).unwrap().color, BaseColor::WHITE.to_linear());
    }

    #[test]
    fn tick_converges_smoothly() {
        let mut sync = MaterialSynchronizer::new(BaseColor::WHITE, 4.0);
        sync.rebuild(&garment(), 1);
        sync.set_target(BaseColor::BLACK);

        let mut last = sync.current().red;
        for _ in 0..10 {
            sync.tick(1.0 / 60.0);
            let now = sync.current().red;
            assert!(now < last);
            last = now;
        }
        assert!(!sync.is_settled(1e-3));

        sync.tick(10.0);
        assert!(sync.is_settled(1e-3));
        for (_, rgba) in sync.colors() {
            assert!(rgba[0] < 1e-3);
            assert_eq!(rgba[3], 1.0);
        }
    }

    #[test]
    fn split_frames_match_one_long_frame() {
        let mut a = MaterialSynchronizer::new(BaseColor::WHITE, 4.0);
        let mut b = MaterialSynchronizer::new(BaseColor::WHITE, 4.0);
        a.set_target(BaseColor::new(0xe6, 0x39, 0xa8));
        b.set_target(BaseColor::new(0xe6, 0x39, 0xa8));

        a.tick(0.1);
        for _ in 0..4 {
            b.tick(0.025);
        }
        assert!((a.current().green - b.current().green).abs() < 1e-5);
    }

    #[test]
    fn rebuild_seeds_with_displayed_color() {
        let mut sync = MaterialSynchronizer::new(BaseColor::WHITE, 4.0);
        sync.set_target(BaseColor::BLACK);
        sync.tick(0.1);
        let shown = sync.current();

        sync.rebuild(&garment(), 2);
        assert!(sync.arena().iter().all(|m| m.color == shown));
    }
}
