//! Mesh buffers.

use glam::{Vec2, Vec3};

/// Axis-aligned bounds of a mesh in tile-local units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl MeshBounds {
    /// Bounds enclosing all points, or the default (zero) bounds when empty.
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (min, max) = points
            .iter()
            .fold((*first, *first), |(min, max), p| (min.min(*p), max.max(*p)));
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Triangle mesh with unshared vertices.
///
/// Every triangle owns its three vertices, so each vertex carries the normal
/// of exactly one face. `triangles` holds vertex indices in groups of three.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<u32>,
    pub bounds: MeshBounds,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    /// Set every vertex of a triangle to the triangle's face normal.
    ///
    /// Degenerate triangles get a zero normal.
    pub fn recalculate_normals(&mut self) {
        self.normals.resize(self.vertices.len(), Vec3::Y);
        for face in self.triangles.chunks_exact(3) {
            let [a, b, c] = [face[0] as usize, face[1] as usize, face[2] as usize];
            let v0 = self.vertices[a];
            let normal = (self.vertices[b] - v0)
                .cross(self.vertices[c] - v0)
                .normalize_or_zero();
            self.normals[a] = normal;
            self.normals[b] = normal;
            self.normals[c] = normal;
        }
    }

    pub fn recalculate_bounds(&mut self) {
        self.bounds = MeshBounds::from_points(&self.vertices);
    }

    /// Lowest and highest vertex elevation.
    pub fn height_range(&self) -> (f32, f32) {
        (self.bounds.min.y, self.bounds.max.y)
    }
}
