//! Regular grid layout of the low-poly terrain mesh.
//!
//! A tile is sampled on an `N × N` grid of points. Point `(0, 0)` is the
//! north-west corner, `gx` grows eastwards and `gy` southwards. Each of the
//! `(N-1)²` quads is split into two triangles that own their vertices:
//!
//! ```text
//!  (x,y) 0,3 ──── 1 (x+1,y)        triangle 1: 0 (x,y)   1 (x+1,y)   2 (x,y+1)
//!         │  ╲    │                triangle 2: 3 (x+1,y) 4 (x+1,y+1) 5 (x,y+1)
//!         │    ╲  │
//! (x,y+1) 2,5 ─── 4 (x+1,y+1)
//! ```
//!
//! so one grid point is shared by up to six vertices.

use glam::{Vec2, Vec3};

use super::{MeshBounds, MeshData, MeshError};
use crate::coord::TileBounds;

/// Smallest usable sample count (a single quad).
pub const MIN_SAMPLE_COUNT: usize = 2;

/// Largest accepted sample count.
pub const MAX_SAMPLE_COUNT: usize = 256;

const VERTICES_PER_QUAD: usize = 6;

/// Index arithmetic for an `N × N` sample grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    sample_count: usize,
}

impl GridLayout {
    /// # Errors
    ///
    /// Returns `MeshError::InvalidSampleCount` outside `2..=256`.
    pub fn new(sample_count: usize) -> Result<Self, MeshError> {
        if !(MIN_SAMPLE_COUNT..=MAX_SAMPLE_COUNT).contains(&sample_count) {
            return Err(MeshError::InvalidSampleCount(sample_count));
        }
        Ok(Self { sample_count })
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Index of the last row and column.
    #[inline]
    pub fn cap(&self) -> usize {
        self.sample_count - 1
    }

    pub fn quad_count(&self) -> usize {
        self.cap() * self.cap()
    }

    pub fn vertex_count(&self) -> usize {
        self.quad_count() * VERTICES_PER_QUAD
    }

    /// First vertex index of the quad whose north-west corner is `(x, y)`.
    #[inline]
    pub fn quad_base(&self, x: usize, y: usize) -> usize {
        (y * self.cap() + x) * VERTICES_PER_QUAD
    }

    /// Indices of every vertex sitting on grid point `(gx, gy)`.
    pub fn vertices_at(&self, gx: usize, gy: usize) -> impl Iterator<Item = usize> {
        let cap = self.cap();
        let mut found = [None; VERTICES_PER_QUAD];

        if gx < cap && gy < cap {
            found[0] = Some(self.quad_base(gx, gy));
        }
        if gx > 0 && gx <= cap && gy < cap {
            let base = self.quad_base(gx - 1, gy);
            found[1] = Some(base + 1);
            found[2] = Some(base + 3);
        }
        if gx < cap && gy > 0 && gy <= cap {
            let base = self.quad_base(gx, gy - 1);
            found[3] = Some(base + 2);
            found[4] = Some(base + 5);
        }
        if gx > 0 && gy > 0 && gx <= cap && gy <= cap {
            found[5] = Some(self.quad_base(gx - 1, gy - 1) + 4);
        }

        found.into_iter().flatten()
    }

    /// Elevation at a grid point.
    pub fn height_at(&self, mesh: &MeshData, gx: usize, gy: usize) -> Option<f32> {
        self.vertices_at(gx, gy)
            .next()
            .and_then(|i| mesh.vertices.get(i))
            .map(|v| v.y)
    }

    /// Set the elevation of every vertex on a grid point.
    pub fn set_height_at(&self, mesh: &mut MeshData, gx: usize, gy: usize, height: f32) {
        for i in self.vertices_at(gx, gy) {
            if let Some(vertex) = mesh.vertices.get_mut(i) {
                vertex.y = height;
            }
        }
    }
}

/// Build the flat base grid for a tile.
///
/// # Arguments
///
/// * `layout` - Sample grid
/// * `bounds` - Tile footprint; positions are relative to its center
/// * `scale` - World units per Mercator metre
pub fn build_base_mesh(layout: &GridLayout, bounds: &TileBounds, scale: f32) -> MeshData {
    let cap = layout.cap();
    let center = bounds.center();
    let step = 1.0 / cap as f64;

    let point = |gx: usize, gy: usize| -> (Vec3, Vec2) {
        let tx = gx as f64 * step;
        let ty = gy as f64 * step;
        let x = lerp(bounds.min.x, bounds.max.x, tx) - center.x;
        let z = lerp(bounds.min.y, bounds.max.y, ty) - center.y;
        (
            Vec3::new(x as f32 * scale, 0.0, z as f32 * scale),
            Vec2::new(tx as f32, 1.0 - ty as f32),
        )
    };

    let count = layout.vertex_count();
    let mut vertices = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);

    for y in 0..cap {
        for x in 0..cap {
            let corners = [
                (x, y),
                (x + 1, y),
                (x, y + 1),
                (x + 1, y),
                (x + 1, y + 1),
                (x, y + 1),
            ];
            for (gx, gy) in corners {
                let (position, uv) = point(gx, gy);
                vertices.push(position);
                uvs.push(uv);
            }
        }
    }

    let bounds = MeshBounds::from_points(&vertices);
    MeshData {
        vertices,
        normals: vec![Vec3::Y; count],
        uvs,
        triangles: (0..count as u32).collect(),
        bounds,
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{tile_bounds, TileId};

    fn layout(n: usize) -> GridLayout {
        GridLayout::new(n).unwrap()
    }

    #[test]
    fn test_sample_count_bounds() {
        assert!(matches!(GridLayout::new(1), Err(MeshError::InvalidSampleCount(1))));
        assert!(GridLayout::new(2).is_ok());
        assert!(GridLayout::new(256).is_ok());
        assert!(GridLayout::new(257).is_err());
    }

    #[test]
    fn test_counts() {
        let grid = layout(10);
        assert_eq!(grid.cap(), 9);
        assert_eq!(grid.vertex_count(), 6 * 81);
        assert_eq!(grid.quad_base(2, 1), (9 + 2) * 6);
    }

    #[test]
    fn test_vertices_per_point() {
        let grid = layout(4);
        // Corners
        assert_eq!(grid.vertices_at(0, 0).count(), 1);
        assert_eq!(grid.vertices_at(3, 0).count(), 2);
        assert_eq!(grid.vertices_at(0, 3).count(), 2);
        assert_eq!(grid.vertices_at(3, 3).count(), 1);
        // Edge and interior
        assert_eq!(grid.vertices_at(1, 0).count(), 3);
        assert_eq!(grid.vertices_at(1, 1).count(), 6);
        // Out of range
        assert_eq!(grid.vertices_at(4, 0).count(), 0);
    }

    #[test]
    fn test_every_vertex_belongs_to_one_point() {
        let grid = layout(5);
        let mut seen = vec![0u32; grid.vertex_count()];
        for gy in 0..=grid.cap() {
            for gx in 0..=grid.cap() {
                for i in grid.vertices_at(gx, gy) {
                    seen[i] += 1;
                }
            }
        }
        assert!(seen.iter().all(|n| *n == 1));
    }

    #[test]
    fn test_vertices_at_share_position() {
        let grid = layout(4);
        let bounds = tile_bounds(&TileId { z: 4, x: 3, y: 5 });
        let mesh = build_base_mesh(&grid, &bounds, 0.001);
        for gy in 0..=grid.cap() {
            for gx in 0..=grid.cap() {
                let mut positions = grid.vertices_at(gx, gy).map(|i| mesh.vertices[i]);
                let first = positions.next().unwrap();
                assert!(positions.all(|p| p == first));
            }
        }
    }

    #[test]
    fn test_base_mesh_orientation() {
        let grid = layout(3);
        let bounds = tile_bounds(&TileId { z: 1, x: 0, y: 0 });
        let mesh = build_base_mesh(&grid, &bounds, 1.0);

        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 8);
        assert!(mesh.vertices.iter().all(|v| v.y == 0.0));

        let nw = mesh.vertices[grid.vertices_at(0, 0).next().unwrap()];
        let se = mesh.vertices[grid.vertices_at(2, 2).next().unwrap()];
        assert!(nw.x < 0.0 && nw.z > 0.0);
        assert!(se.x > 0.0 && se.z < 0.0);

        let nw_uv = mesh.uvs[grid.vertices_at(0, 0).next().unwrap()];
        assert_eq!(nw_uv, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_base_mesh_normals_are_up() {
        let grid = layout(4);
        let bounds = tile_bounds(&TileId { z: 2, x: 1, y: 1 });
        let mut mesh = build_base_mesh(&grid, &bounds, 1.0e-3);
        mesh.recalculate_normals();
        assert!(mesh
            .normals
            .iter()
            .all(|n| (n.y - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_set_height_at_moves_all_copies() {
        let grid = layout(4);
        let bounds = tile_bounds(&TileId { z: 2, x: 1, y: 1 });
        let mut mesh = build_base_mesh(&grid, &bounds, 1.0);
        grid.set_height_at(&mut mesh, 1, 1, 7.5);

        assert_eq!(grid.height_at(&mesh, 1, 1), Some(7.5));
        assert!(grid.vertices_at(1, 1).all(|i| mesh.vertices[i].y == 7.5));
        assert_eq!(grid.height_at(&mesh, 2, 1), Some(0.0));
    }
}
