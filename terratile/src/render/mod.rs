//! Renderable handle owned by each tile.
//!
//! The core never talks to a scene graph directly. It pushes meshes, textures
//! and colliders through a [`RenderTarget`], which the embedding application
//! binds to whatever it draws with.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::mesh::MeshData;
use crate::tile::RasterImage;

/// Sink for everything a tile displays.
pub trait RenderTarget: Send {
    /// Show or hide the tile.
    fn set_active(&mut self, active: bool);

    /// Uniform scale of the tile in the world, `2^(initial_zoom - zoom)`.
    fn set_scale(&mut self, scale: f32);

    /// Replace the displayed mesh.
    fn apply_mesh(&mut self, mesh: &MeshData);

    /// Replace the texture, `None` clears it.
    fn set_texture(&mut self, texture: Option<&RasterImage>);

    /// Replace the collision mesh, `None` removes it.
    fn set_collider(&mut self, mesh: Option<&MeshData>);
}

/// Render target that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderTarget;

impl RenderTarget for NullRenderTarget {
    fn set_active(&mut self, _active: bool) {}

    fn set_scale(&mut self, _scale: f32) {}

    fn apply_mesh(&mut self, _mesh: &MeshData) {}

    fn set_texture(&mut self, _texture: Option<&RasterImage>) {}

    fn set_collider(&mut self, _mesh: Option<&MeshData>) {}
}

/// Last state written to a [`MemoryRenderTarget`].
#[derive(Debug, Clone, Default)]
pub struct RenderSnapshot {
    pub active: bool,
    /// Last value passed to `set_scale`
    pub scale: f32,
    pub mesh: Option<MeshData>,
    pub texture: Option<RasterImage>,
    pub collider: Option<MeshData>,
    /// Number of `apply_mesh` calls
    pub mesh_updates: usize,
}

/// Render target that records what was written.
///
/// Cloning shares the snapshot, so a caller can keep one handle and give the
/// other to a tile.
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderTarget {
    snapshot: Arc<Mutex<RenderSnapshot>>,
}

impl MemoryRenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Mutex<RenderSnapshot>> {
        Arc::clone(&self.snapshot)
    }
}

impl RenderTarget for MemoryRenderTarget {
    fn set_active(&mut self, active: bool) {
        self.snapshot.lock().active = active;
    }

    fn set_scale(&mut self, scale: f32) {
        self.snapshot.lock().scale = scale;
    }

    fn apply_mesh(&mut self, mesh: &MeshData) {
        let mut snapshot = self.snapshot.lock();
        snapshot.mesh = Some(mesh.clone());
        snapshot.mesh_updates += 1;
    }

    fn set_texture(&mut self, texture: Option<&RasterImage>) {
        self.snapshot.lock().texture = texture.cloned();
    }

    fn set_collider(&mut self, mesh: Option<&MeshData>) {
        self.snapshot.lock().collider = mesh.cloned();
    }
}
