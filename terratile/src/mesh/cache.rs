//! Finished meshes keyed by tile identity.
//!
//! The cache is the source of truth for stitching: a tile copies its border
//! heights from whatever neighbour meshes are published here when it is
//! generated.

use std::sync::Arc;

use dashmap::DashMap;

use super::MeshData;
use crate::coord::TileId;

/// Concurrent map from unwrapped tile identity to its latest mesh.
#[derive(Debug, Default)]
pub struct MeshCache {
    meshes: DashMap<TileId, Arc<MeshData>>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a mesh, replacing any previous one for the same tile.
    pub fn insert(&self, id: TileId, mesh: Arc<MeshData>) {
        self.meshes.insert(id, mesh);
    }

    pub fn get(&self, id: &TileId) -> Option<Arc<MeshData>> {
        self.meshes.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &TileId) -> Option<Arc<MeshData>> {
        self.meshes.remove(id).map(|(_, mesh)| mesh)
    }

    pub fn contains(&self, id: &TileId) -> bool {
        self.meshes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&self) {
        self.meshes.clear();
    }
}
