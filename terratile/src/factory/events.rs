//! Events reported to the map.

use std::fmt;

use crate::coord::TileId;
use crate::fetch::TileFetchError;
use crate::mesh::MeshError;
use crate::tile::DataChannel;

/// Outbound notification from a [`TerrainFactory`](super::TerrainFactory).
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// A tile has settled its raster and height channels.
    ReadyForMeshGeneration(TileId),
    /// A source could not deliver a payload.
    FetchError(TileFetchError),
    /// A payload arrived but could not be decoded.
    DecodeError {
        tile: TileId,
        channel: DataChannel,
        reason: String,
    },
    /// A mesh was generated and pushed to the tile's render target.
    MeshGenerated(TileId),
    MeshFailed { tile: TileId, error: MeshError },
}

impl MapEvent {
    /// Tile the event is about.
    pub fn tile(&self) -> TileId {
        match self {
            MapEvent::ReadyForMeshGeneration(tile) | MapEvent::MeshGenerated(tile) => *tile,
            MapEvent::FetchError(err) => err.tile,
            MapEvent::DecodeError { tile, .. } | MapEvent::MeshFailed { tile, .. } => *tile,
        }
    }
}

impl fmt::Display for MapEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapEvent::ReadyForMeshGeneration(tile) => {
                write!(f, "{} ready for mesh generation", tile)
            }
            MapEvent::FetchError(err) => write!(f, "{}", err),
            MapEvent::DecodeError {
                tile,
                channel,
                reason,
            } => write!(f, "{} {} decode failed: {}", tile, channel, reason),
            MapEvent::MeshGenerated(tile) => write!(f, "{} mesh generated", tile),
            MapEvent::MeshFailed { tile, error } => write!(f, "{} mesh failed: {}", tile, error),
        }
    }
}
