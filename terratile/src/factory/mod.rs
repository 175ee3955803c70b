//! Terrain factory
//!
//! Owns the tile pool and drives the whole pipeline on one thread:
//!
//! 1. `load_tile` initializes a pooled tile and issues one fetch per enabled
//!    channel
//! 2. completions are pumped back and applied to the tile they belong to
//! 3. the tile's readiness signal triggers mesh generation through the
//!    configured [`TerrainStrategy`]
//!
//! Everything the map needs to know is reported as a [`MapEvent`].

mod events;

pub use events::MapEvent;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigFileError, ElevationOptions, TerrainConfig, TerrainKind};
use crate::coord::TileId;
use crate::fetch::{DataSource, Delivery, FetchCompletion, FetchError, TileDataFetcher};
use crate::mesh::{strategy_for, MeshCache, MeshError, TerrainStrategy};
use crate::render::{NullRenderTarget, RenderTarget};
use crate::tile::{
    DataChannel, RasterImage, Tile, TileDataError, TileEvent, TileEventKind, TileSlot,
    VectorTileData,
};

/// Creates the render target for each new pooled tile.
pub type RenderTargetFactory = Box<dyn FnMut(TileSlot) -> Box<dyn RenderTarget> + Send>;

/// Tile pool plus fetch and mesh orchestration.
pub struct TerrainFactory {
    config: TerrainConfig,
    strategy: Box<dyn TerrainStrategy>,
    fetcher: TileDataFetcher,
    tiles: Vec<Tile>,
    free: Vec<TileSlot>,
    active: HashMap<TileId, TileSlot>,
    render_targets: RenderTargetFactory,
    loading_texture: Option<RasterImage>,
    tile_events_tx: mpsc::UnboundedSender<TileEvent>,
    tile_events_rx: mpsc::UnboundedReceiver<TileEvent>,
    map_events: mpsc::UnboundedSender<MapEvent>,
}

impl TerrainFactory {
    /// Create a factory.
    ///
    /// # Arguments
    ///
    /// * `config` - Pipeline settings
    /// * `source` - Backend for all three channels
    /// * `strategy` - Mesh strategy run when a tile is ready
    ///
    /// # Returns
    ///
    /// The factory and the receiver for its [`MapEvent`]s.
    pub fn new(
        config: TerrainConfig,
        source: Arc<dyn DataSource>,
        strategy: Box<dyn TerrainStrategy>,
    ) -> (Self, mpsc::UnboundedReceiver<MapEvent>) {
        let fetcher = TileDataFetcher::new(source, config.source.clone(), config.raster.use_retina);
        let (tile_events_tx, tile_events_rx) = mpsc::unbounded_channel();
        let (map_events, map_events_rx) = mpsc::unbounded_channel();

        info!(
            terrain = %strategy.kind(),
            samples = config.elevation.sample_count,
            source = fetcher.source_name(),
            "Terrain factory created"
        );

        let factory = Self {
            config,
            strategy,
            fetcher,
            tiles: Vec::new(),
            free: Vec::new(),
            active: HashMap::new(),
            render_targets: Box::new(|_: TileSlot| -> Box<dyn RenderTarget> {
                Box::new(NullRenderTarget)
            }),
            loading_texture: None,
            tile_events_tx,
            tile_events_rx,
            map_events,
        };
        (factory, map_events_rx)
    }

    /// Create a factory with the strategy selected by the config and a fresh
    /// mesh cache.
    pub fn from_config(
        config: TerrainConfig,
        source: Arc<dyn DataSource>,
    ) -> (Self, mpsc::UnboundedReceiver<MapEvent>) {
        let strategy = strategy_for(config.elevation, Arc::new(MeshCache::new()));
        Self::new(config, source, strategy)
    }

    /// Use `make` to create render targets for new tiles.
    pub fn with_render_targets<F>(mut self, make: F) -> Self
    where
        F: FnMut(TileSlot) -> Box<dyn RenderTarget> + Send + 'static,
    {
        self.render_targets = Box::new(make);
        self
    }

    /// Texture shown by tiles while imagery is loading.
    pub fn with_loading_texture(mut self, texture: RasterImage) -> Self {
        self.loading_texture = Some(texture);
        self
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Meshes published for stitching, if the strategy publishes any.
    pub fn mesh_cache(&self) -> Option<&Arc<MeshCache>> {
        self.strategy.mesh_cache()
    }

    pub fn tile(&self, slot: TileSlot) -> Option<&Tile> {
        self.tiles.get(slot.0)
    }

    /// Slot currently showing `id`.
    pub fn slot_for(&self, id: TileId) -> Option<TileSlot> {
        self.active.get(&id).copied()
    }

    /// Initialized tiles.
    pub fn active_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().filter(|t| t.is_initialized())
    }

    /// Number of tiles ever created, pooled or not.
    pub fn pool_size(&self) -> usize {
        self.tiles.len()
    }

    /// Fetches still waiting for a completion.
    pub fn outstanding(&self) -> usize {
        self.fetcher.outstanding()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Show `id` in a pooled tile and start fetching its data.
    ///
    /// Loading an identity that is already shown returns its slot without
    /// issuing new fetches.
    ///
    /// # Arguments
    ///
    /// * `id` - Unwrapped tile identity
    /// * `scale` - World units per Mercator metre
    /// * `zoom` - Current map zoom
    pub fn load_tile(&mut self, id: TileId, scale: f32, zoom: u8) -> Result<TileSlot, FetchError> {
        if let Some(slot) = self.slot_for(id) {
            return Ok(slot);
        }

        let slot = self.acquire_slot();
        let tile = &mut self.tiles[slot.0];
        tile.initialize(id, scale, zoom, &self.config.map);
        tile.subscribe(Box::new(self.tile_events_tx.clone()));
        self.active.insert(id, slot);

        if self.strategy.kind() == TerrainKind::Flat {
            self.generate(slot);
        }

        let tile = &mut self.tiles[slot.0];
        for channel in self.config.source.channels.iter() {
            self.fetcher.fetch(tile, channel)?;
        }

        debug!(tile = %id, slot = %slot, "Tile loading");
        Ok(slot)
    }

    fn acquire_slot(&mut self) -> TileSlot {
        if let Some(slot) = self.free.pop() {
            return slot;
        }
        let slot = TileSlot(self.tiles.len());
        let mut tile = Tile::new(slot, (self.render_targets)(slot));
        tile.set_loading_texture(self.loading_texture.clone());
        self.tiles.push(tile);
        slot
    }

    /// Recycle a tile and return it to the pool.
    ///
    /// Its published mesh is withdrawn and any in-flight fetches are
    /// cancelled. Releasing an idle slot does nothing.
    pub fn release(&mut self, slot: TileSlot) {
        let Some(tile) = self.tiles.get_mut(slot.0) else {
            return;
        };
        let Some(id) = tile.id() else {
            return;
        };

        self.strategy.unregister_tile(tile);
        tile.recycle();
        self.active.remove(&id);
        self.free.push(slot);
    }

    // =========================================================================
    // Completion handling
    // =========================================================================

    /// Apply one fetch completion.
    pub fn process_completion(&mut self, completion: FetchCompletion) {
        let slot = completion.request.slot;
        let Some(tile) = self.tiles.get_mut(slot.0) else {
            warn!(slot = %slot, "Completion for unknown slot");
            return;
        };

        match self.fetcher.deliver(tile, completion) {
            Delivery::Received { channel, payload } => {
                let tile_id = tile.id();
                let result = match channel {
                    DataChannel::Height => tile.set_height_data(&payload),
                    DataChannel::Raster => tile.set_raster_data(
                        &payload,
                        self.config.raster.use_mipmap,
                        self.config.raster.use_compression,
                    ),
                    DataChannel::Vector => tile.set_vector_data(VectorTileData::new(payload)),
                };
                if let Err(error) = result {
                    self.report_decode_error(tile_id, channel, error);
                }
            }
            Delivery::Failed(error) => {
                tile.fail_channel(error.channel);
                self.emit(MapEvent::FetchError(error));
            }
            Delivery::Stale | Delivery::Cancelled => {}
        }

        self.drain_tile_events();
    }

    /// Apply every completion that has already arrived.
    ///
    /// Returns the number processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Some(completion) = self.fetcher.try_next_completion() {
            self.process_completion(completion);
            processed += 1;
        }
        processed
    }

    /// Wait for and apply completions until nothing is outstanding.
    pub async fn run_until_idle(&mut self) {
        while let Some(completion) = self.fetcher.next_completion().await {
            self.process_completion(completion);
        }
    }

    fn report_decode_error(
        &self,
        tile: Option<TileId>,
        channel: DataChannel,
        error: TileDataError,
    ) {
        let Some(tile) = tile else {
            return;
        };
        warn!(tile = %tile, channel = %channel, error = %error, "Failed to decode tile data");
        self.emit(MapEvent::DecodeError {
            tile,
            channel,
            reason: error.to_string(),
        });
    }

    fn drain_tile_events(&mut self) {
        while let Ok(event) = self.tile_events_rx.try_recv() {
            trace!(tile = %event.tile, kind = ?event.kind, "Tile event");
            if event.kind != TileEventKind::ReadyForMeshGeneration {
                continue;
            }
            // Ignore signals from identities the slot no longer shows
            let current = self.tiles.get(event.slot.0).and_then(Tile::id);
            if current != Some(event.tile) {
                continue;
            }
            self.emit(MapEvent::ReadyForMeshGeneration(event.tile));
            self.generate(event.slot);
        }
    }

    // =========================================================================
    // Mesh generation
    // =========================================================================

    /// Run the strategy again for a tile.
    ///
    /// # Errors
    ///
    /// Returns `MeshError::TileNotInitialized` for idle slots.
    pub fn regenerate(&mut self, slot: TileSlot) -> Result<(), MeshError> {
        let tile = self
            .tiles
            .get_mut(slot.0)
            .ok_or(MeshError::TileNotInitialized(slot))?;
        let result = self.strategy.register_tile(tile);
        if let Some(id) = tile.id() {
            self.report_mesh_result(id, result.clone());
        }
        result
    }

    /// Switch to new elevation options and rebuild every active mesh.
    ///
    /// The strategy is rebuilt for the new terrain kind, keeping the mesh
    /// cache. Active tiles are withdrawn from the cache first and regenerated
    /// in slot order, so each one stitches against the tiles rebuilt before
    /// it. Tiles still waiting for data mesh with the new options once ready.
    ///
    /// # Returns
    ///
    /// The number of tiles regenerated.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFileError::InvalidValue` and keeps the current options
    /// when `options` is out of range.
    pub fn set_elevation_options(
        &mut self,
        options: ElevationOptions,
    ) -> Result<usize, ConfigFileError> {
        self.config.clone().with_elevation(options).validate()?;

        let cache = self
            .strategy
            .mesh_cache()
            .cloned()
            .unwrap_or_else(|| Arc::new(MeshCache::new()));
        for tile in self.tiles.iter().filter(|t| t.is_initialized()) {
            self.strategy.unregister_tile(tile);
        }
        self.strategy = strategy_for(options, cache);
        self.config.elevation = options;

        let flat = options.terrain == TerrainKind::Flat;
        let slots: Vec<TileSlot> = self
            .tiles
            .iter()
            .filter(|t| t.is_initialized() && (flat || t.is_ready_for_mesh()))
            .map(Tile::slot)
            .collect();
        for slot in &slots {
            self.generate(*slot);
        }

        info!(
            terrain = %options.terrain,
            samples = options.sample_count,
            exaggeration = options.exaggeration_factor,
            regenerated = slots.len(),
            "Elevation options changed"
        );
        Ok(slots.len())
    }

    fn generate(&mut self, slot: TileSlot) {
        let _ = self.regenerate(slot);
    }

    fn report_mesh_result(&self, tile: TileId, result: Result<(), MeshError>) {
        match result {
            Ok(()) => self.emit(MapEvent::MeshGenerated(tile)),
            Err(error) => {
                warn!(tile = %tile, error = %error, "Mesh generation failed");
                self.emit(MapEvent::MeshFailed { tile, error });
            }
        }
    }

    fn emit(&self, event: MapEvent) {
        // The map may have stopped listening
        let _ = self.map_events.send(event);
    }
}
