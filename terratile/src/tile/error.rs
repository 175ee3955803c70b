//! Error types for decoding tile payloads.

use thiserror::Error;

use super::DataChannel;

/// Errors raised while turning fetched bytes into tile data.
///
/// None of these are fatal: the affected channel is marked `Error` and the
/// tile keeps whatever data it had before.
#[derive(Debug, Error)]
pub enum TileDataError {
    /// The payload could not be decoded as an image.
    #[error("Failed to decode {channel} image: {source}")]
    Image {
        channel: DataChannel,
        #[source]
        source: image::ImageError,
    },

    /// The decoded height image has an unusable shape.
    #[error("Invalid height grid {width}×{height}: {reason}")]
    InvalidHeightGrid {
        width: u32,
        height: u32,
        reason: &'static str,
    },

    /// Data arrived for a tile that is sitting in the pool.
    #[error("Tile is not initialized")]
    NotInitialized,
}
