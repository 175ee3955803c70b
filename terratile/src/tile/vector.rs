//! Vector feature payloads.

use bytes::Bytes;

/// Encoded vector tile attached to a map tile.
///
/// Feature decoding belongs to downstream consumers; the core only carries the
/// payload so it is released together with the tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorTileData {
    data: Bytes,
}

impl VectorTileData {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for VectorTileData {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}
