//! Tile identity module
//!
//! Provides the unwrapped and canonical tile identities, neighbour lookup in
//! eight directions, and the Web Mercator footprint used to place a tile's
//! mesh.

mod types;


pub use types::{
    tiles_per_axis, CanonicalTileId, CoordError, Direction, MercatorPoint, TileBounds, TileId,
    MAX_ZOOM, ORIGIN_SHIFT,
};

use std::f64::consts::PI;

/// Computes the Web Mercator footprint of a tile.
///
/// Unwrapped columns outside `0..2^z` produce bounds on the neighbouring world
/// copy, which keeps adjacent cells contiguous across the antimeridian.
#[inline]
pub fn tile_bounds(id: &TileId) -> TileBounds {
    let size = tile_size_meters(id.z);
    let west = id.x as f64 * size - ORIGIN_SHIFT;
    let north = ORIGIN_SHIFT - id.y as f64 * size;

    TileBounds {
        min: MercatorPoint { x: west, y: north },
        max: MercatorPoint {
            x: west + size,
            y: north - size,
        },
    }
}

/// Edge length of a tile at the given zoom, in metres.
#[inline]
pub fn tile_size_meters(z: u8) -> f64 {
    2.0 * ORIGIN_SHIFT / tiles_per_axis(z) as f64
}

/// Latitude of the tile's center in degrees.
#[inline]
pub fn tile_center_latitude(id: &TileId) -> f64 {
    let n = tiles_per_axis(id.z) as f64;
    let y = (id.y as f64 + 0.5) / n;
    (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees()
}
