//! The pooled map tile.
//!
//! A [`Tile`] is one cell of the visible grid. It is created once, then
//! initialized and recycled many times as the view moves. Between two recycles
//! it collects the payloads of its three data channels and raises
//! `ReadyForMeshGeneration` exactly once, as soon as neither raster nor height
//! is still in flight.

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{
    decode_raster, decode_terrain_rgb, ChannelState, ChannelStates, DataChannel, HeightGrid,
    ObserverList, RasterImage, TileDataError, TileEvent, TileEventKind, TileObserver, TileSlot,
    VectorTileData,
};
use crate::config::MapFrame;
use crate::coord::{tile_bounds, CanonicalTileId, MercatorPoint, TileBounds, TileId};
use crate::mesh::{MeshData, MeshKind};
use crate::render::RenderTarget;

/// Fetch currently tracked for one channel.
#[derive(Debug)]
struct AttachedFetch {
    request_id: u64,
    token: CancellationToken,
}

/// A reusable map tile.
pub struct Tile {
    slot: TileSlot,
    id: Option<TileId>,
    canonical: Option<CanonicalTileId>,
    bounds: TileBounds,
    scale: f32,
    initial_zoom: Option<u8>,
    relative_scale: f32,
    world_scale: f32,

    states: ChannelStates,
    ready: bool,
    height: Option<HeightGrid>,
    raster: Option<RasterImage>,
    vector: Option<VectorTileData>,
    fetches: [Option<AttachedFetch>; 3],

    mesh: Option<MeshData>,
    mesh_kind: Option<MeshKind>,
    render: Box<dyn RenderTarget>,
    loading_texture: Option<RasterImage>,
    observers: ObserverList,
}

impl Tile {
    /// Create an idle tile bound to a render target.
    pub fn new(slot: TileSlot, render: Box<dyn RenderTarget>) -> Self {
        let origin = MercatorPoint { x: 0.0, y: 0.0 };
        Self {
            slot,
            id: None,
            canonical: None,
            bounds: TileBounds {
                min: origin,
                max: origin,
            },
            scale: 1.0,
            initial_zoom: None,
            relative_scale: 1.0,
            world_scale: 1.0,
            states: ChannelStates::default(),
            ready: false,
            height: None,
            raster: None,
            vector: None,
            fetches: [None, None, None],
            mesh: None,
            mesh_kind: None,
            render,
            loading_texture: None,
            observers: ObserverList::default(),
        }
    }

    /// Place the tile at a new identity.
    ///
    /// # Arguments
    ///
    /// * `id` - Unwrapped tile identity
    /// * `scale` - World units per Mercator metre for this tile
    /// * `zoom` - Current map zoom, compared against the frame's initial zoom
    /// * `frame` - Map context providing the center latitude
    ///
    /// Initializing a tile that is still showing another identity drops its
    /// observers as `recycle` would, so the readiness signal of the new
    /// identity reaches only observers subscribed afterwards.
    pub fn initialize(&mut self, id: TileId, scale: f32, zoom: u8, frame: &MapFrame) {
        self.cancel_fetches();
        self.reset_data();
        self.observers.clear();

        self.id = Some(id);
        self.canonical = Some(id.canonical());
        self.bounds = tile_bounds(&id);
        self.scale = scale;

        let initial_zoom = *self.initial_zoom.get_or_insert(frame.initial_zoom);
        self.world_scale = 2f32.powi(initial_zoom as i32 - zoom as i32);
        self.render.set_scale(self.world_scale);

        let cos = frame.center_latitude.to_radians().cos() as f32;
        self.relative_scale = if cos > f32::EPSILON { 1.0 / cos } else { 1.0 };

        self.render.set_active(true);
        debug!(tile = %id, slot = %self.slot, "Tile initialized");
    }

    pub fn slot(&self) -> TileSlot {
        self.slot
    }

    /// Current identity, `None` while pooled.
    pub fn id(&self) -> Option<TileId> {
        self.id
    }

    pub fn canonical(&self) -> Option<CanonicalTileId> {
        self.canonical
    }

    pub fn is_initialized(&self) -> bool {
        self.id.is_some()
    }

    pub fn bounds(&self) -> &TileBounds {
        &self.bounds
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// `1 / cos(center latitude)` of the map the tile was placed in.
    pub fn relative_scale(&self) -> f32 {
        self.relative_scale
    }

    /// `2^(initial_zoom - zoom)`.
    pub fn world_scale(&self) -> f32 {
        self.world_scale
    }

    pub fn initial_zoom(&self) -> Option<u8> {
        self.initial_zoom
    }

    pub fn states(&self) -> ChannelStates {
        self.states
    }

    pub fn state(&self, channel: DataChannel) -> ChannelState {
        self.states.get(channel)
    }

    /// Whether `ReadyForMeshGeneration` has fired since the last recycle.
    pub fn is_ready_for_mesh(&self) -> bool {
        self.ready
    }

    pub fn height(&self) -> Option<&HeightGrid> {
        self.height.as_ref()
    }

    pub fn raster(&self) -> Option<&RasterImage> {
        self.raster.as_ref()
    }

    pub fn vector(&self) -> Option<&VectorTileData> {
        self.vector.as_ref()
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        self.mesh.as_ref()
    }

    /// Strategy and resolution that built the current base mesh.
    pub fn terrain_kind(&self) -> Option<MeshKind> {
        self.mesh_kind
    }

    pub fn render(&self) -> &dyn RenderTarget {
        self.render.as_ref()
    }

    pub fn render_mut(&mut self) -> &mut dyn RenderTarget {
        self.render.as_mut()
    }

    /// Texture shown while imagery is loading and after recycling.
    pub fn set_loading_texture(&mut self, texture: Option<RasterImage>) {
        self.loading_texture = texture;
        if self.raster.is_none() {
            self.render.set_texture(self.loading_texture.as_ref());
        }
    }

    /// Register an observer until the next recycle.
    pub fn subscribe(&mut self, observer: Box<dyn TileObserver>) {
        self.observers.subscribe(observer);
    }

    // =========================================================================
    // Channel payloads
    // =========================================================================

    /// Decode terrain-RGB bytes into the height grid.
    ///
    /// The existing grid is only replaced when decoding succeeds. Either way
    /// `HeightChanged` is raised so the readiness gate can make progress.
    pub fn set_height_data(&mut self, data: &[u8]) -> Result<(), TileDataError> {
        self.require_initialized()?;
        self.states.set(DataChannel::Height, ChannelState::Processing);

        let result = decode_terrain_rgb(data).map(|grid| {
            self.height = Some(grid);
        });
        self.finish_channel(DataChannel::Height, result.is_ok());
        result
    }

    /// Assign an already decoded height grid.
    pub fn set_height_grid(&mut self, grid: HeightGrid) -> Result<(), TileDataError> {
        self.require_initialized()?;
        self.height = Some(grid);
        self.finish_channel(DataChannel::Height, true);
        Ok(())
    }

    /// Decode imagery and hand the texture to the render target.
    pub fn set_raster_data(
        &mut self,
        data: &[u8],
        use_mipmap: bool,
        use_compression: bool,
    ) -> Result<(), TileDataError> {
        self.require_initialized()?;
        self.states.set(DataChannel::Raster, ChannelState::Processing);

        let result = decode_raster(data, use_mipmap, use_compression).map(|raster| {
            self.render.set_texture(Some(&raster));
            self.raster = Some(raster);
        });
        self.finish_channel(DataChannel::Raster, result.is_ok());
        result
    }

    /// Attach vector features.
    pub fn set_vector_data(&mut self, data: VectorTileData) -> Result<(), TileDataError> {
        self.require_initialized()?;
        self.vector = Some(data);
        self.finish_channel(DataChannel::Vector, true);
        Ok(())
    }

    /// Mark a channel as failed without touching its payload.
    pub fn fail_channel(&mut self, channel: DataChannel) {
        if self.id.is_none() {
            return;
        }
        self.finish_channel(channel, false);
    }

    /// Elevation at tile-local `(u, v)`, multiplied by the tile scale.
    ///
    /// Returns `0.0` until height data has arrived.
    pub fn query_height(&self, u: f32, v: f32) -> f32 {
        match &self.height {
            Some(grid) => grid.sample(u, v) * self.scale,
            None => 0.0,
        }
    }

    fn require_initialized(&self) -> Result<(), TileDataError> {
        if self.id.is_none() {
            return Err(TileDataError::NotInitialized);
        }
        Ok(())
    }

    fn finish_channel(&mut self, channel: DataChannel, success: bool) {
        let state = if success {
            ChannelState::Finished
        } else {
            ChannelState::Error
        };
        self.states.set(channel, state);

        let kind = match channel {
            DataChannel::Height => TileEventKind::HeightChanged,
            DataChannel::Raster => TileEventKind::RasterChanged,
            DataChannel::Vector => TileEventKind::VectorChanged,
        };
        self.raise(kind);

        if channel != DataChannel::Vector {
            self.evaluate_readiness();
        }
    }

    fn evaluate_readiness(&mut self) {
        if self.ready || !self.states.mesh_inputs_settled() {
            return;
        }
        self.ready = true;
        self.raise(TileEventKind::ReadyForMeshGeneration);
    }

    fn raise(&mut self, kind: TileEventKind) {
        let Some(tile) = self.id else {
            return;
        };
        let event = TileEvent {
            slot: self.slot,
            tile,
            kind,
        };
        self.observers.notify(&event);
    }

    // =========================================================================
    // Fetch tracking
    // =========================================================================

    /// Start tracking a fetch for `channel` and mark it `Fetching`.
    ///
    /// A fetch already tracked on the channel is superseded, not cancelled.
    pub fn attach_fetch(
        &mut self,
        channel: DataChannel,
        request_id: u64,
        token: CancellationToken,
    ) {
        self.states.set(channel, ChannelState::Fetching);
        self.fetches[channel.index()] = Some(AttachedFetch { request_id, token });
    }

    /// Stop tracking a fetch if it is still the one attached to `channel`.
    pub fn release_fetch(&mut self, channel: DataChannel, request_id: u64) {
        let slot = &mut self.fetches[channel.index()];
        if slot.as_ref().is_some_and(|f| f.request_id == request_id) {
            *slot = None;
        }
    }

    /// Id of the fetch currently tracked for `channel`.
    pub fn attached_fetch(&self, channel: DataChannel) -> Option<u64> {
        self.fetches[channel.index()].as_ref().map(|f| f.request_id)
    }

    /// Cancel all tracked fetches.
    ///
    /// In-flight channels become `Cancelled`. The readiness gate is not
    /// evaluated.
    pub fn cancel(&mut self) {
        self.cancel_fetches();
        for channel in DataChannel::ALL {
            if self.states.get(channel).is_in_flight() {
                self.states.set(channel, ChannelState::Cancelled);
            }
        }
    }

    fn cancel_fetches(&mut self) {
        for fetch in self.fetches.iter_mut().filter_map(Option::take) {
            trace!(request = fetch.request_id, "Cancelling fetch");
            fetch.token.cancel();
        }
    }

    // =========================================================================
    // Pooling
    // =========================================================================

    /// Return the tile to its idle state.
    ///
    /// The base mesh buffer is kept for reuse by the next identity.
    pub fn recycle(&mut self) {
        self.render.set_texture(self.loading_texture.as_ref());
        self.render.set_active(false);
        self.cancel_fetches();
        self.reset_data();
        self.observers.clear();

        if let Some(id) = self.id.take() {
            debug!(tile = %id, slot = %self.slot, "Tile recycled");
        }
        self.canonical = None;
    }

    fn reset_data(&mut self) {
        self.states = ChannelStates::default();
        self.ready = false;
        self.height = None;
        self.raster = None;
        self.vector = None;
    }

    // =========================================================================
    // Mesh storage (used by terrain strategies)
    // =========================================================================

    pub(crate) fn take_mesh(&mut self) -> Option<MeshData> {
        self.mesh.take()
    }

    pub(crate) fn store_mesh(&mut self, mesh: MeshData, kind: MeshKind) {
        self.mesh = Some(mesh);
        self.mesh_kind = Some(kind);
    }
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .field("states", &self.states)
            .field("ready", &self.ready)
            .field("mesh_kind", &self.mesh_kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{MemoryRenderTarget, NullRenderTarget};
    use crate::tile::encode_terrain_rgb_png;
    use std::sync::Arc;

    use parking_lot::Mutex;

    fn tile_at(id: TileId) -> Tile {
        let mut tile = Tile::new(TileSlot(0), Box::new(NullRenderTarget));
        tile.initialize(id, 1.0, 0, &MapFrame::default());
        tile
    }

    fn record(tile: &mut Tile) -> Arc<Mutex<Vec<TileEventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tile.subscribe(Box::new(move |e: &TileEvent| sink.lock().push(e.kind)));
        seen
    }

    fn ready_count(events: &Mutex<Vec<TileEventKind>>) -> usize {
        events
            .lock()
            .iter()
            .filter(|k| **k == TileEventKind::ReadyForMeshGeneration)
            .count()
    }

    fn id() -> TileId {
        TileId { z: 3, x: 2, y: 2 }
    }

    #[test]
    fn test_initialize_sets_identity_and_scales() {
        let mut tile = Tile::new(TileSlot(4), Box::new(NullRenderTarget));
        let frame = MapFrame {
            center_latitude: 60.0,
            initial_zoom: 3,
        };
        tile.initialize(id(), 2.0, 2, &frame);

        assert_eq!(tile.id(), Some(id()));
        assert_eq!(tile.canonical(), Some(id().canonical()));
        assert_eq!(tile.scale(), 2.0);
        assert_eq!(tile.world_scale(), 2.0);
        assert!((tile.relative_scale() - 2.0).abs() < 1e-4);
        assert_eq!(tile.states(), ChannelStates::default());
    }

    #[test]
    fn test_initial_zoom_is_remembered() {
        let mut tile = Tile::new(TileSlot(0), Box::new(NullRenderTarget));
        tile.initialize(id(), 1.0, 3, &MapFrame { center_latitude: 0.0, initial_zoom: 3 });
        tile.recycle();
        tile.initialize(id(), 1.0, 4, &MapFrame { center_latitude: 0.0, initial_zoom: 5 });
        assert_eq!(tile.initial_zoom(), Some(3));
        assert_eq!(tile.world_scale(), 0.5);
    }

    #[test]
    fn test_world_scale_reaches_render_target() {
        let render = MemoryRenderTarget::new();
        let snapshot = render.snapshot();
        let mut tile = Tile::new(TileSlot(0), Box::new(render));
        let frame = MapFrame {
            center_latitude: 0.0,
            initial_zoom: 3,
        };

        tile.initialize(id(), 1.0, 5, &frame);
        assert_eq!(snapshot.lock().scale, 0.25);

        tile.recycle();
        tile.initialize(id(), 1.0, 2, &frame);
        assert_eq!(snapshot.lock().scale, 2.0);
    }

    #[test]
    fn test_reinitialize_without_recycle_drops_observers() {
        let mut tile = tile_at(id());
        let stale = record(&mut tile);

        tile.initialize(TileId { z: 3, x: 3, y: 2 }, 1.0, 0, &MapFrame::default());
        let current = record(&mut tile);
        tile.set_height_grid(HeightGrid::uniform(2, 0.0)).unwrap();
        tile.fail_channel(DataChannel::Raster);

        assert_eq!(ready_count(&stale), 0);
        assert_eq!(ready_count(&current), 1);
    }

    #[test]
    fn test_query_height_before_data_is_zero() {
        let tile = tile_at(id());
        assert_eq!(tile.query_height(0.5, 0.5), 0.0);
    }

    #[test]
    fn test_query_height_applies_scale() {
        let mut tile = Tile::new(TileSlot(0), Box::new(NullRenderTarget));
        tile.initialize(id(), 0.5, 0, &MapFrame::default());
        tile.set_height_grid(HeightGrid::uniform(4, 10.0)).unwrap();
        assert_eq!(tile.query_height(0.3, 0.7), 5.0);
    }

    #[test]
    fn test_height_data_finishes_channel() {
        let mut tile = tile_at(id());
        let events = record(&mut tile);
        let png = encode_terrain_rgb_png(4, |_, _| 25.0).unwrap();

        tile.set_height_data(&png).unwrap();

        assert_eq!(tile.state(DataChannel::Height), ChannelState::Finished);
        assert_eq!(tile.height().unwrap().samples()[0], 25.0);
        assert_eq!(events.lock()[0], TileEventKind::HeightChanged);
    }

    #[test]
    fn test_bad_height_keeps_previous_grid() {
        let mut tile = tile_at(id());
        tile.set_height_grid(HeightGrid::uniform(2, 7.0)).unwrap();
        let events = record(&mut tile);

        assert!(tile.set_height_data(b"garbage").is_err());

        assert_eq!(tile.state(DataChannel::Height), ChannelState::Error);
        assert_eq!(tile.height().unwrap().samples(), &[7.0; 4]);
        assert_eq!(events.lock()[0], TileEventKind::HeightChanged);
    }

    #[test]
    fn test_ready_waits_for_both_mesh_inputs() {
        let mut tile = tile_at(id());
        let events = record(&mut tile);
        tile.attach_fetch(DataChannel::Raster, 1, CancellationToken::new());
        tile.attach_fetch(DataChannel::Height, 2, CancellationToken::new());

        tile.set_height_grid(HeightGrid::uniform(2, 0.0)).unwrap();
        assert_eq!(ready_count(&events), 0);
        assert!(!tile.is_ready_for_mesh());

        tile.fail_channel(DataChannel::Raster);
        assert_eq!(ready_count(&events), 1);
        assert!(tile.is_ready_for_mesh());
    }

    #[test]
    fn test_ready_fires_once() {
        let mut tile = tile_at(id());
        let events = record(&mut tile);

        tile.set_height_grid(HeightGrid::uniform(2, 0.0)).unwrap();
        tile.set_height_grid(HeightGrid::uniform(2, 1.0)).unwrap();
        tile.fail_channel(DataChannel::Raster);

        assert_eq!(ready_count(&events), 1);
    }

    #[test]
    fn test_vector_does_not_gate() {
        let mut tile = tile_at(id());
        let events = record(&mut tile);
        tile.attach_fetch(DataChannel::Vector, 1, CancellationToken::new());

        tile.set_height_grid(HeightGrid::uniform(2, 0.0)).unwrap();
        assert_eq!(ready_count(&events), 1);

        tile.set_vector_data(VectorTileData::new(bytes::Bytes::from_static(b"pbf")))
            .unwrap();
        assert_eq!(ready_count(&events), 1);
        assert_eq!(*events.lock().last().unwrap(), TileEventKind::VectorChanged);
    }

    #[test]
    fn test_cancel_marks_in_flight_channels() {
        let mut tile = tile_at(id());
        let events = record(&mut tile);
        let token = CancellationToken::new();
        tile.attach_fetch(DataChannel::Height, 7, token.clone());
        tile.set_vector_data(VectorTileData::new(bytes::Bytes::new()))
            .unwrap();

        tile.cancel();

        assert!(token.is_cancelled());
        assert_eq!(tile.state(DataChannel::Height), ChannelState::Cancelled);
        assert_eq!(tile.state(DataChannel::Vector), ChannelState::Finished);
        assert_eq!(tile.attached_fetch(DataChannel::Height), None);
        assert_eq!(ready_count(&events), 0);
    }

    #[test]
    fn test_release_fetch_ignores_superseded_request() {
        let mut tile = tile_at(id());
        tile.attach_fetch(DataChannel::Raster, 1, CancellationToken::new());
        tile.attach_fetch(DataChannel::Raster, 2, CancellationToken::new());

        tile.release_fetch(DataChannel::Raster, 1);
        assert_eq!(tile.attached_fetch(DataChannel::Raster), Some(2));

        tile.release_fetch(DataChannel::Raster, 2);
        assert_eq!(tile.attached_fetch(DataChannel::Raster), None);
    }

    #[test]
    fn test_recycle_resets_everything() {
        let render = MemoryRenderTarget::new();
        let snapshot = render.snapshot();
        let mut tile = Tile::new(TileSlot(1), Box::new(render));
        tile.initialize(id(), 1.0, 0, &MapFrame::default());
        let events = record(&mut tile);
        let token = CancellationToken::new();
        tile.attach_fetch(DataChannel::Raster, 3, token.clone());
        tile.set_height_grid(HeightGrid::uniform(2, 1.0)).unwrap();
        tile.set_loading_texture(Some(RasterImage::solid(2, 2, [9, 9, 9, 255])));

        tile.recycle();

        assert!(token.is_cancelled());
        assert_eq!(tile.id(), None);
        assert_eq!(tile.states(), ChannelStates::default());
        assert!(!tile.is_ready_for_mesh());
        assert!(tile.height().is_none());
        assert!(!snapshot.lock().active);
        assert_eq!(snapshot.lock().texture.as_ref().unwrap().width(), 2);

        // Observers are gone; payloads are refused while pooled
        let before = events.lock().len();
        assert!(matches!(
            tile.set_height_grid(HeightGrid::uniform(2, 1.0)),
            Err(TileDataError::NotInitialized)
        ));
        assert_eq!(events.lock().len(), before);
    }

    #[test]
    fn test_recycle_idle_tile_is_safe() {
        let mut tile = Tile::new(TileSlot(0), Box::new(NullRenderTarget));
        tile.recycle();
        tile.recycle();
        assert!(!tile.is_initialized());
    }

    #[test]
    fn test_ready_fires_again_after_recycle() {
        let mut tile = tile_at(id());
        let first = record(&mut tile);
        tile.set_height_grid(HeightGrid::uniform(2, 0.0)).unwrap();
        tile.recycle();

        tile.initialize(id(), 1.0, 0, &MapFrame::default());
        let second = record(&mut tile);
        tile.set_height_grid(HeightGrid::uniform(2, 0.0)).unwrap();

        assert_eq!(ready_count(&first), 1);
        assert_eq!(ready_count(&second), 1);
    }
}
