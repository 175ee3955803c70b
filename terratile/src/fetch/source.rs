//! Data sources for tile payloads.
//!
//! A [`DataSource`] turns a canonical tile and a channel into raw bytes. The
//! trait is dyn-compatible so the fetcher can hold any backend behind an
//! `Arc<dyn DataSource>`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tracing::trace;

use crate::coord::CanonicalTileId;
use crate::tile::DataChannel;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source has no payload for this tile and channel.
    #[error("No {channel} data for tile {tile}")]
    NotFound {
        tile: CanonicalTileId,
        channel: DataChannel,
    },

    /// Reading the payload failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The backend refused or could not serve the request.
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Everything a source needs to locate one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub tile: CanonicalTileId,
    pub channel: DataChannel,
    /// Dataset identifier, e.g. `mapbox.terrain-rgb`
    pub map_id: String,
    /// Prefer double-resolution imagery where the source has it
    pub use_retina: bool,
}

/// Asynchronous provider of tile payloads.
///
/// Implementations must be `Send + Sync`; the returned future is polled on a
/// spawned task.
pub trait DataSource: Send + Sync {
    /// Fetch the payload for one tile and channel.
    ///
    /// # Arguments
    ///
    /// * `request` - Canonical tile, channel and dataset to read
    ///
    /// # Errors
    ///
    /// Returns `SourceError::NotFound` when the source has no such payload.
    fn fetch(&self, request: SourceRequest) -> BoxFuture<'_, Result<Bytes, SourceError>>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// File system source
// =============================================================================

/// Reads payloads from a directory tree laid out as
/// `{root}/{map_id}/{z}/{x}/{y}.{ext}`.
///
/// With `use_retina`, raster requests first look for `{y}@2x.{ext}` and fall
/// back to the plain file.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
}

impl FileSystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the payload for a request, ignoring the retina variant.
    pub fn tile_path(&self, request: &SourceRequest) -> PathBuf {
        self.tile_dir(request).join(format!(
            "{}.{}",
            request.tile.y,
            request.channel.extension()
        ))
    }

    fn retina_path(&self, request: &SourceRequest) -> PathBuf {
        self.tile_dir(request).join(format!(
            "{}@2x.{}",
            request.tile.y,
            request.channel.extension()
        ))
    }

    fn tile_dir(&self, request: &SourceRequest) -> PathBuf {
        self.root
            .join(&request.map_id)
            .join(request.tile.z.to_string())
            .join(request.tile.x.to_string())
    }

    async fn read(&self, request: SourceRequest) -> Result<Bytes, SourceError> {
        let mut candidates = Vec::with_capacity(2);
        if request.use_retina && request.channel == DataChannel::Raster {
            candidates.push(self.retina_path(&request));
        }
        candidates.push(self.tile_path(&request));

        for path in candidates {
            match tokio::fs::read(&path).await {
                Ok(data) => {
                    trace!(path = %path.display(), bytes = data.len(), "Read tile payload");
                    return Ok(Bytes::from(data));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(SourceError::Io(format!("{}: {}", path.display(), e)));
                }
            }
        }

        Err(SourceError::NotFound {
            tile: request.tile,
            channel: request.channel,
        })
    }
}

impl DataSource for FileSystemSource {
    fn fetch(&self, request: SourceRequest) -> BoxFuture<'_, Result<Bytes, SourceError>> {
        Box::pin(self.read(request))
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}

// =============================================================================
// In-memory source
// =============================================================================

/// In-memory source with scripted payloads and failures.
///
/// Used by tests and by embedders that produce payloads themselves. Requests
/// for keys with neither a payload nor a failure return `NotFound`.
#[derive(Debug, Default)]
pub struct MemorySource {
    payloads: DashMap<(CanonicalTileId, DataChannel), Bytes>,
    failures: DashMap<(CanonicalTileId, DataChannel), SourceError>,
    latency: Option<Duration>,
    requests: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, tile: CanonicalTileId, channel: DataChannel, data: impl Into<Bytes>) {
        self.failures.remove(&(tile, channel));
        self.payloads.insert((tile, channel), data.into());
    }

    /// Make requests for this key fail with `error`.
    pub fn fail(&self, tile: CanonicalTileId, channel: DataChannel, error: SourceError) {
        self.payloads.remove(&(tile, channel));
        self.failures.insert((tile, channel), error);
    }

    /// Number of fetches served so far, including failures.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    fn lookup(&self, request: &SourceRequest) -> Result<Bytes, SourceError> {
        let key = (request.tile, request.channel);
        if let Some(error) = self.failures.get(&key) {
            return Err(error.value().clone());
        }
        self.payloads
            .get(&key)
            .map(|data| data.value().clone())
            .ok_or(SourceError::NotFound {
                tile: request.tile,
                channel: request.channel,
            })
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, request: SourceRequest) -> BoxFuture<'_, Result<Bytes, SourceError>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        Box::pin(async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.lookup(&request)
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
