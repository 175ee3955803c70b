//! Terrain mesh generation
//!
//! Builds a regular sample grid per tile, displaces it by the tile's height
//! data, and stitches its borders to neighbours published in a shared
//! [`MeshCache`].

mod cache;
mod data;
mod grid;
mod stitch;
mod strategy;

pub use cache::MeshCache;
pub use data::{MeshBounds, MeshData};
pub use grid::{build_base_mesh, GridLayout, MAX_SAMPLE_COUNT, MIN_SAMPLE_COUNT};
pub use stitch::{stitch_direction, stitch_to_neighbors};
pub use strategy::{
    strategy_for, FlatTerrainStrategy, LowPolyTerrainStrategy, MeshKind, TerrainStrategy,
};

use thiserror::Error;

use crate::tile::TileSlot;

/// Errors raised while generating meshes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error(
        "Invalid sample count {0} (expected {min}..={max})",
        min = MIN_SAMPLE_COUNT,
        max = MAX_SAMPLE_COUNT
    )]
    InvalidSampleCount(usize),

    #[error("Tile in slot {0} is not initialized")]
    TileNotInitialized(TileSlot),
}
