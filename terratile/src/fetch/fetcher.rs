//! Fetch issue and completion correlation.
//!
//! [`TileDataFetcher::fetch`] spawns one task per request. Each task sends
//! exactly one [`FetchCompletion`] back over an unbounded channel, and the
//! owner of the tiles consumes completions on its own thread through
//! [`TileDataFetcher::deliver`]. A completion is only applied when the tile
//! still carries the identity captured when the request was issued; anything
//! else is discarded without touching the tile.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{DataSource, SourceError, SourceRequest};
use crate::config::SourceOptions;
use crate::coord::TileId;
use crate::tile::{DataChannel, Tile, TileSlot};

/// Errors raised when issuing a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The tile has no identity to fetch for.
    #[error("Cannot fetch {channel} data for slot {slot}: tile is not initialized")]
    TileNotInitialized { slot: TileSlot, channel: DataChannel },
}

/// A failed fetch, reported to the map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to fetch {channel} data for tile {tile}: {cause}")]
pub struct TileFetchError {
    pub tile: TileId,
    pub channel: DataChannel,
    #[source]
    pub cause: SourceError,
}

/// Correlation record of one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Unique per fetcher
    pub id: u64,
    pub slot: TileSlot,
    /// Identity the tile had when the fetch was issued
    pub tile: TileId,
    pub channel: DataChannel,
}

/// How a fetch task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed(Result<Bytes, SourceError>),
    Cancelled,
}

/// Message sent back by a fetch task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion {
    pub request: FetchRequest,
    pub outcome: FetchOutcome,
}

/// What applying a completion to a tile amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Payload for the tile's current identity.
    Received { channel: DataChannel, payload: Bytes },
    /// The source reported an error.
    Failed(TileFetchError),
    /// The tile has moved on or was recycled; nothing was changed.
    Stale,
    /// The fetch was cancelled before it finished.
    Cancelled,
}

/// Issues fetches and correlates their completions with tiles.
pub struct TileDataFetcher {
    source: Arc<dyn DataSource>,
    options: SourceOptions,
    use_retina: bool,
    tx: mpsc::UnboundedSender<FetchCompletion>,
    rx: mpsc::UnboundedReceiver<FetchCompletion>,
    next_id: u64,
    outstanding: usize,
}

impl TileDataFetcher {
    /// Create a fetcher.
    ///
    /// # Arguments
    ///
    /// * `source` - Backend every request is sent to
    /// * `options` - Dataset identifiers per channel
    /// * `use_retina` - Request double-resolution imagery
    pub fn new(source: Arc<dyn DataSource>, options: SourceOptions, use_retina: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            options,
            use_retina,
            tx,
            rx,
            next_id: 1,
            outstanding: 0,
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Number of issued fetches whose completion has not been received.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Issue a fetch for one channel of a tile.
    ///
    /// Marks the channel `Fetching` and attaches the request's cancellation
    /// token to the tile. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::TileNotInitialized` for pooled tiles.
    pub fn fetch(
        &mut self,
        tile: &mut Tile,
        channel: DataChannel,
    ) -> Result<FetchRequest, FetchError> {
        let (Some(id), Some(canonical)) = (tile.id(), tile.canonical()) else {
            return Err(FetchError::TileNotInitialized {
                slot: tile.slot(),
                channel,
            });
        };

        let request = FetchRequest {
            id: self.next_id,
            slot: tile.slot(),
            tile: id,
            channel,
        };
        self.next_id += 1;

        let token = CancellationToken::new();
        tile.attach_fetch(channel, request.id, token.clone());

        let source_request = SourceRequest {
            tile: canonical,
            channel,
            map_id: self.options.map_id(channel).to_string(),
            use_retina: self.use_retina,
        };

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => FetchOutcome::Cancelled,
                result = source.fetch(source_request) => FetchOutcome::Completed(result),
            };
            // The receiver only goes away with the fetcher itself
            let _ = tx.send(FetchCompletion { request, outcome });
        });

        self.outstanding += 1;
        trace!(tile = %id, channel = %channel, request = request.id, "Fetch issued");
        Ok(request)
    }

    /// Wait for the next completion.
    ///
    /// Returns `None` once nothing is outstanding.
    pub async fn next_completion(&mut self) -> Option<FetchCompletion> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.outstanding -= 1;
        Some(completion)
    }

    /// Take a completion if one is already queued.
    pub fn try_next_completion(&mut self) -> Option<FetchCompletion> {
        let completion = self.rx.try_recv().ok()?;
        self.outstanding = self.outstanding.saturating_sub(1);
        Some(completion)
    }

    /// Apply a completion to the tile it was issued for.
    ///
    /// Stale completions leave the tile untouched. Otherwise the tile stops
    /// tracking the request and the payload or error is handed back to the
    /// caller.
    pub fn deliver(&self, tile: &mut Tile, completion: FetchCompletion) -> Delivery {
        let FetchCompletion { request, outcome } = completion;

        if tile.slot() != request.slot || tile.id() != Some(request.tile) {
            trace!(
                tile = %request.tile,
                channel = %request.channel,
                request = request.id,
                "Discarding stale fetch completion"
            );
            return Delivery::Stale;
        }

        tile.release_fetch(request.channel, request.id);

        match outcome {
            FetchOutcome::Cancelled => {
                debug!(tile = %request.tile, channel = %request.channel, "Fetch cancelled");
                Delivery::Cancelled
            }
            FetchOutcome::Completed(Ok(payload)) => Delivery::Received {
                channel: request.channel,
                payload,
            },
            FetchOutcome::Completed(Err(cause)) => {
                warn!(
                    tile = %request.tile,
                    channel = %request.channel,
                    source = self.source.name(),
                    error = %cause,
                    "Fetch failed"
                );
                Delivery::Failed(TileFetchError {
                    tile: request.tile,
                    channel: request.channel,
                    cause,
                })
            }
        }
    }
}
