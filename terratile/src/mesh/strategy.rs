//! Terrain mesh strategies.
//!
//! A strategy turns a tile's data into the mesh shown by its render target.
//! [`LowPolyTerrainStrategy`] displaces a sample grid by the tile's height
//! data and stitches it to its neighbours; [`FlatTerrainStrategy`] shows the
//! undisplaced grid.

use std::sync::Arc;

use glam::Vec3;
use tracing::debug;

use super::{build_base_mesh, stitch_to_neighbors, GridLayout, MeshCache, MeshData, MeshError};
use crate::config::{ElevationOptions, TerrainKind};
use crate::tile::Tile;

/// Sample count of the flat mesh.
const FLAT_SAMPLE_COUNT: usize = 2;

/// What a tile's base mesh was built for.
///
/// The base grid is rebuilt whenever any of these change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshKind {
    pub terrain: TerrainKind,
    pub sample_count: usize,
    /// Scaled edge length of the tile
    pub extent: f32,
}

/// Builds and tears down tile meshes.
pub trait TerrainStrategy: Send + Sync {
    fn kind(&self) -> TerrainKind;

    /// Generate (or regenerate) the mesh of an initialized tile.
    ///
    /// # Errors
    ///
    /// Returns `MeshError::TileNotInitialized` for pooled tiles.
    fn register_tile(&self, tile: &mut Tile) -> Result<(), MeshError>;

    /// Forget anything published for the tile.
    fn unregister_tile(&self, tile: &Tile);

    /// Cache the strategy publishes finished meshes into, if any.
    fn mesh_cache(&self) -> Option<&Arc<MeshCache>> {
        None
    }
}

/// Strategy for the configured terrain kind.
pub fn strategy_for(options: ElevationOptions, cache: Arc<MeshCache>) -> Box<dyn TerrainStrategy> {
    match options.terrain {
        TerrainKind::Flat => Box::new(FlatTerrainStrategy::new(options)),
        TerrainKind::LowPoly => Box::new(LowPolyTerrainStrategy::new(options, cache)),
    }
}

/// Take the tile's base mesh if it still matches `kind`, otherwise build one.
fn base_mesh(tile: &mut Tile, layout: &GridLayout, kind: MeshKind) -> MeshData {
    let reusable = tile.terrain_kind() == Some(kind);
    match tile.take_mesh() {
        Some(mesh) if reusable => mesh,
        _ => {
            debug!(
                slot = %tile.slot(),
                terrain = %kind.terrain,
                samples = kind.sample_count,
                "Building base mesh"
            );
            build_base_mesh(layout, tile.bounds(), tile.scale())
        }
    }
}

fn mesh_kind(tile: &Tile, terrain: TerrainKind, layout: &GridLayout) -> MeshKind {
    MeshKind {
        terrain,
        sample_count: layout.sample_count(),
        extent: (tile.bounds().size() as f32) * tile.scale(),
    }
}

// =============================================================================
// Low poly
// =============================================================================

/// Height-displaced grid with per-face normals, stitched to cached neighbours.
#[derive(Debug)]
pub struct LowPolyTerrainStrategy {
    options: ElevationOptions,
    cache: Arc<MeshCache>,
}

impl LowPolyTerrainStrategy {
    pub fn new(options: ElevationOptions, cache: Arc<MeshCache>) -> Self {
        Self { options, cache }
    }

    pub fn options(&self) -> &ElevationOptions {
        &self.options
    }
}

impl TerrainStrategy for LowPolyTerrainStrategy {
    fn kind(&self) -> TerrainKind {
        TerrainKind::LowPoly
    }

    fn register_tile(&self, tile: &mut Tile) -> Result<(), MeshError> {
        let id = tile
            .id()
            .ok_or(MeshError::TileNotInitialized(tile.slot()))?;
        let layout = GridLayout::new(self.options.sample_count)?;
        let kind = mesh_kind(tile, TerrainKind::LowPoly, &layout);

        let mut mesh = base_mesh(tile, &layout, kind);

        let factor = self.options.exaggeration_factor
            * if self.options.use_relative_height {
                tile.relative_scale()
            } else {
                1.0
            };
        for (vertex, uv) in mesh.vertices.iter_mut().zip(&mesh.uvs) {
            vertex.y = tile.query_height(uv.x, uv.y) * factor;
        }

        let stitched = stitch_to_neighbors(&mut mesh, &layout, id, &self.cache);
        mesh.recalculate_normals();
        mesh.recalculate_bounds();

        tile.render_mut().apply_mesh(&mesh);
        if self.options.add_collider {
            tile.render_mut().set_collider(Some(&mesh));
        }
        self.cache.insert(id, Arc::new(mesh.clone()));

        let (low, high) = mesh.height_range();
        debug!(tile = %id, stitched, low, high, "Terrain mesh generated");

        tile.store_mesh(mesh, kind);
        Ok(())
    }

    fn unregister_tile(&self, tile: &Tile) {
        if let Some(id) = tile.id() {
            self.cache.remove(&id);
        }
    }

    fn mesh_cache(&self) -> Option<&Arc<MeshCache>> {
        Some(&self.cache)
    }
}

// =============================================================================
// Flat
// =============================================================================

/// Undisplaced single-quad mesh.
#[derive(Debug)]
pub struct FlatTerrainStrategy {
    options: ElevationOptions,
}

impl FlatTerrainStrategy {
    pub fn new(options: ElevationOptions) -> Self {
        Self { options }
    }
}

impl TerrainStrategy for FlatTerrainStrategy {
    fn kind(&self) -> TerrainKind {
        TerrainKind::Flat
    }

    fn register_tile(&self, tile: &mut Tile) -> Result<(), MeshError> {
        if tile.id().is_none() {
            return Err(MeshError::TileNotInitialized(tile.slot()));
        }
        let layout = GridLayout::new(FLAT_SAMPLE_COUNT)?;
        let kind = mesh_kind(tile, TerrainKind::Flat, &layout);

        let mut mesh = base_mesh(tile, &layout, kind);
        mesh.vertices.iter_mut().for_each(|v| v.y = 0.0);
        mesh.normals.iter_mut().for_each(|n| *n = Vec3::Y);
        mesh.recalculate_bounds();

        tile.render_mut().apply_mesh(&mesh);
        if self.options.add_collider {
            tile.render_mut().set_collider(Some(&mesh));
        }
        tile.store_mesh(mesh, kind);
        Ok(())
    }

    fn unregister_tile(&self, _tile: &Tile) {}
}
