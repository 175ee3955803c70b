//! Seam stitching between adjacent tiles.
//!
//! Neighbour meshes are read from the [`MeshCache`]; only the mesh being
//! generated is written. Edges copy a full row or column of heights from the
//! neighbour's facing border, diagonals copy the single shared corner.

use tracing::trace;

use super::{GridLayout, MeshCache, MeshData};
use crate::coord::{Direction, TileId};

/// Copy border heights from every cached neighbour of `id` into `mesh`.
///
/// Neighbours whose vertex count differs from `layout` are skipped. Returns
/// the number of neighbours stitched against.
pub fn stitch_to_neighbors(
    mesh: &mut MeshData,
    layout: &GridLayout,
    id: TileId,
    cache: &MeshCache,
) -> usize {
    let mut stitched = 0;
    for (direction, neighbor_id) in id.neighbors() {
        let Some(neighbor) = cache.get(&neighbor_id) else {
            continue;
        };
        if neighbor.vertex_count() != layout.vertex_count() {
            trace!(
                tile = %id,
                neighbor = %neighbor_id,
                "Skipping neighbour with different resolution"
            );
            continue;
        }
        stitch_direction(mesh, &neighbor, layout, direction);
        stitched += 1;
    }
    stitched
}

/// Copy the shared border with the neighbour lying in `direction`.
pub fn stitch_direction(
    mesh: &mut MeshData,
    neighbor: &MeshData,
    layout: &GridLayout,
    direction: Direction,
) {
    let cap = layout.cap();
    let mut copy = |(ours_x, ours_y): (usize, usize), (theirs_x, theirs_y): (usize, usize)| {
        if let Some(height) = layout.height_at(neighbor, theirs_x, theirs_y) {
            layout.set_height_at(mesh, ours_x, ours_y, height);
        }
    };

    match direction {
        Direction::North => (0..=cap).for_each(|i| copy((i, 0), (i, cap))),
        Direction::South => (0..=cap).for_each(|i| copy((i, cap), (i, 0))),
        Direction::West => (0..=cap).for_each(|i| copy((0, i), (cap, i))),
        Direction::East => (0..=cap).for_each(|i| copy((cap, i), (0, i))),
        Direction::NorthWest => copy((0, 0), (cap, cap)),
        Direction::NorthEast => copy((cap, 0), (0, cap)),
        Direction::SouthWest => copy((0, cap), (cap, 0)),
        Direction::SouthEast => copy((cap, cap), (0, 0)),
    }
}
