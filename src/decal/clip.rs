//! Box projection of a texture onto triangle geometry.
//!
//! The projector is a unit cube (`[-0.5, 0.5]` on every axis) placed by a
//! matrix. Every triangle of the target mesh is moved into projector space,
//! clipped against the six faces of the cube, and what survives becomes the
//! decal geometry. Texture coordinates are the projector-space `xy` shifted
//! into `[0, 1]`.

use glam::{Mat4, Vec2, Vec3};

use crate::scene::MeshData;

const HALF: f32 = 0.5;

/// Triangle soup produced by a projection, in the target mesh's local space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecalMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// `u` grows along the projector's +x, `v` along its +y.
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl DecalMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_polygon(&mut self, polygon: &[ClipVertex], projector: Mat4) {
        if polygon.len() < 3 {
            return;
        }
        let base = self.positions.len() as u32;
        for v in polygon {
            self.positions.push(projector.transform_point3(v.position));
            self.normals.push(v.normal.try_normalize().unwrap_or(Vec3::Z));
            // Intersections on the box faces can land a hair outside it.
            let uv = Vec2::new(v.position.x + HALF, v.position.y + HALF);
            self.uvs.push(uv.clamp(Vec2::ZERO, Vec2::ONE));
        }
        for i in 1..polygon.len() as u32 - 1 {
            self.indices.extend_from_slice(&[base, base + i, base + i + 1]);
        }
    }
}

/// The flat quad drawn at a projector's transform as a placement guide.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePlane {
    pub positions: [Vec3; 4],
    pub normal: Vec3,
    pub uvs: [Vec2; 4],
    pub indices: [u32; 6],
}

impl ReferencePlane {
    pub fn new(projector: Mat4) -> Self {
        let corners = [
            Vec3::new(-HALF, -HALF, 0.0),
            Vec3::new(HALF, -HALF, 0.0),
            Vec3::new(HALF, HALF, 0.0),
            Vec3::new(-HALF, HALF, 0.0),
        ];
        Self {
            positions: corners.map(|c| projector.transform_point3(c)),
            normal: projector.transform_vector3(Vec3::Z).normalize_or_zero(),
            uvs: [
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            indices: [0, 1, 2, 0, 2, 3],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    /// Projector space.
    position: Vec3,
    /// Mesh-local space.
    normal: Vec3,
}

impl ClipVertex {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            normal: self.normal.lerp(other.normal, t),
        }
    }
}

/// Projects the unit cube placed by `projector` (mesh-local space) onto
/// `mesh`.
///
/// Triangles facing away from the projector are dropped so a front print
/// never bleeds through to the back panel. A singular projector yields an
/// empty mesh.
pub fn project_decal(mesh: &MeshData, projector: Mat4) -> DecalMesh {
    let mut out = DecalMesh::default();

    let det = projector.determinant();
    if !det.is_finite() || det.abs() < f32::MIN_POSITIVE {
        return out;
    }
    let to_projector = projector.inverse();
    let orientation = det.signum();

    for [a, b, c] in mesh.triangles() {
        let vertex = |i: u32| ClipVertex {
            position: to_projector.transform_point3(mesh.positions[i as usize]),
            normal: mesh.normals.get(i as usize).copied().unwrap_or(Vec3::ZERO),
        };
        let tri = [vertex(a), vertex(b), vertex(c)];

        let face = (tri[1].position - tri[0].position).cross(tri[2].position - tri[0].position);
        if face.z * orientation <= 0.0 {
            continue;
        }

        if let Some(polygon) = clip_to_box(&tri) {
            out.push_polygon(&polygon, projector);
        }
    }
    out
}

/// Sutherland–Hodgman against the six faces of the unit cube.
fn clip_to_box(triangle: &[ClipVertex; 3]) -> Option<Vec<ClipVertex>> {
    let mut polygon = triangle.to_vec();
    for axis in 0..3 {
        for sign in [1.0f32, -1.0] {
            polygon = clip_plane(&polygon, axis, sign);
            if polygon.len() < 3 {
                return None;
            }
        }
    }
    Some(polygon)
}

/// Keeps the part of `polygon` where `sign * p[axis] <= 0.5`.
fn clip_plane(polygon: &[ClipVertex], axis: usize, sign: f32) -> Vec<ClipVertex> {
    let distance = |v: &ClipVertex| sign * v.position[axis] - HALF;

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, current) in polygon.iter().enumerate() {
        let next = &polygon[(i + 1) % polygon.len()];
        let (dc, dn) = (distance(current), distance(next));

        if dc <= 0.0 {
            out.push(*current);
        }
        if (dc <= 0.0) != (dn <= 0.0) {
            let t = dc / (dc - dn);
            out.push(current.lerp(next, t));
        }
    }
    out
}
