//! Integration tests for the terrain pipeline.
//!
//! These tests drive tiles end to end:
//! - fetch issue → completion → channel state → readiness → mesh
//! - stale completions after recycling
//! - seam stitching between neighbours generated one after another
//!
//! Run with: `cargo test --test terrain_pipeline_integration`

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use terratile::config::{ElevationOptions, SourceOptions, TerrainConfig};
use terratile::coord::TileId;
use terratile::factory::{MapEvent, TerrainFactory};
use terratile::fetch::{Delivery, MemorySource, TileDataFetcher};
use terratile::mesh::GridLayout;
use terratile::render::{MemoryRenderTarget, NullRenderTarget, RenderSnapshot};
use terratile::tile::{
    encode_terrain_rgb_png, ChannelState, DataChannel, Tile, TileEvent, TileEventKind, TileSlot,
};

// ============================================================================
// Helper Functions
// ============================================================================

const SCALE: f32 = 1.0e-3;

fn tile_id() -> TileId {
    TileId::new(6, 33, 22).unwrap()
}

/// Terrain-RGB PNG with the same height everywhere.
fn uniform_png(height: f32) -> Vec<u8> {
    encode_terrain_rgb_png(8, |_, _| height).unwrap()
}

/// Terrain-RGB PNG sloping up towards the south-east.
fn sloped_png(base: f32) -> Vec<u8> {
    encode_terrain_rgb_png(16, |col, row| base + (col * 7 + row * 3) as f32).unwrap()
}

/// Solid raster PNG.
fn raster_png() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(8, 8, image::Rgba([40, 120, 60, 255]));
    let mut buffer = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn source_with(tiles: &[(TileId, Vec<u8>)]) -> MemorySource {
    let source = MemorySource::new();
    for (id, height) in tiles {
        source.insert(id.canonical(), DataChannel::Height, height.clone());
        source.insert(id.canonical(), DataChannel::Raster, raster_png());
        source.insert(id.canonical(), DataChannel::Vector, &b"features"[..]);
    }
    source
}

fn config(sample_count: usize, exaggeration: f32) -> TerrainConfig {
    TerrainConfig::default().with_elevation(
        ElevationOptions::default()
            .with_sample_count(sample_count)
            .with_exaggeration(exaggeration),
    )
}

fn drain(rx: &mut mpsc::UnboundedReceiver<MapEvent>) -> Vec<MapEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn ready_events(events: &[MapEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, MapEvent::ReadyForMeshGeneration(_)))
        .count()
}

/// Factory whose render targets can be inspected afterwards.
fn observed_factory(
    config: TerrainConfig,
    source: MemorySource,
) -> (
    TerrainFactory,
    mpsc::UnboundedReceiver<MapEvent>,
    Arc<Mutex<Vec<Arc<Mutex<RenderSnapshot>>>>>,
) {
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    let (factory, rx) = TerrainFactory::from_config(config, Arc::new(source));
    let factory = factory.with_render_targets(move |_| {
        let target = MemoryRenderTarget::new();
        sink.lock().push(target.snapshot());
        Box::new(target)
    });
    (factory, rx, snapshots)
}

// ============================================================================
// Readiness
// ============================================================================

/// Ready fires exactly once, and only once raster and height have settled.
#[tokio::test]
async fn test_ready_fires_once_after_mesh_inputs_settle() {
    let source = Arc::new(source_with(&[(tile_id(), uniform_png(12.0))]));
    let mut fetcher = TileDataFetcher::new(source, SourceOptions::default(), false);
    let mut tile = Tile::new(TileSlot(0), Box::new(NullRenderTarget));
    tile.initialize(tile_id(), SCALE, 6, &Default::default());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    tile.subscribe(Box::new(move |e: &TileEvent| sink.lock().push(e.kind)));

    for channel in DataChannel::ALL {
        fetcher.fetch(&mut tile, channel).unwrap();
    }

    while let Some(completion) = fetcher.next_completion().await {
        if let Delivery::Received { channel, payload } = fetcher.deliver(&mut tile, completion) {
            match channel {
                DataChannel::Height => tile.set_height_data(&payload).unwrap(),
                DataChannel::Raster => tile.set_raster_data(&payload, true, false).unwrap(),
                DataChannel::Vector => tile.set_vector_data(payload.into()).unwrap(),
            }
        }

        if tile.is_ready_for_mesh() {
            assert!(!tile.state(DataChannel::Raster).is_in_flight());
            assert!(!tile.state(DataChannel::Height).is_in_flight());
        }
    }

    let ready = seen
        .lock()
        .iter()
        .filter(|k| **k == TileEventKind::ReadyForMeshGeneration)
        .count();
    assert_eq!(ready, 1);
    assert_eq!(tile.states().raster(), ChannelState::Finished);
    assert_eq!(tile.states().height(), ChannelState::Finished);
    assert_eq!(tile.states().vector(), ChannelState::Finished);
    assert_eq!(tile.raster().unwrap().mip_count(), 4);
}

/// Loading through the factory produces one ready signal and one mesh per tile.
#[tokio::test]
async fn test_factory_reports_ready_then_mesh() {
    let (mut factory, mut rx) = TerrainFactory::from_config(
        config(6, 1.0),
        Arc::new(source_with(&[(tile_id(), uniform_png(3.0))])),
    );

    factory.load_tile(tile_id(), SCALE, 6).unwrap();
    factory.run_until_idle().await;

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            MapEvent::ReadyForMeshGeneration(tile_id()),
            MapEvent::MeshGenerated(tile_id()),
        ]
    );
}

// ============================================================================
// Stale completions
// ============================================================================

/// A completion for an identity the tile no longer shows changes nothing.
#[tokio::test]
async fn test_stale_completion_does_not_mutate() {
    let source = Arc::new(source_with(&[(tile_id(), uniform_png(50.0))]));
    let mut fetcher = TileDataFetcher::new(source, SourceOptions::default(), false);
    let mut tile = Tile::new(TileSlot(0), Box::new(NullRenderTarget));
    tile.initialize(tile_id(), SCALE, 6, &Default::default());

    fetcher.fetch(&mut tile, DataChannel::Height).unwrap();
    let completion = fetcher.next_completion().await.unwrap();

    tile.recycle();
    let other = TileId::new(6, 40, 22).unwrap();
    tile.initialize(other, SCALE, 6, &Default::default());

    assert_eq!(fetcher.deliver(&mut tile, completion), Delivery::Stale);
    assert_eq!(tile.state(DataChannel::Height), ChannelState::Unset);
    assert!(tile.height().is_none());
    assert!(!tile.is_ready_for_mesh());
}

/// Releasing a tile mid-fetch leaves height unset and never signals ready.
#[tokio::test(start_paused = true)]
async fn test_recycle_during_in_flight_height_fetch() {
    let source =
        source_with(&[(tile_id(), uniform_png(50.0))]).with_latency(Duration::from_secs(5));
    let (mut factory, mut rx) = TerrainFactory::from_config(config(4, 1.0), Arc::new(source));

    let slot = factory.load_tile(tile_id(), SCALE, 6).unwrap();
    assert_eq!(
        factory.tile(slot).unwrap().state(DataChannel::Height),
        ChannelState::Fetching
    );

    factory.release(slot);
    factory.run_until_idle().await;

    let tile = factory.tile(slot).unwrap();
    assert_eq!(tile.state(DataChannel::Height), ChannelState::Unset);
    assert!(!tile.is_ready_for_mesh());
    assert!(drain(&mut rx).is_empty());
}

/// A slot reused for a new identity only ever reflects the new identity.
#[tokio::test(start_paused = true)]
async fn test_reused_slot_ignores_previous_identity() {
    let first = tile_id();
    let second = TileId::new(6, 34, 22).unwrap();
    let source = source_with(&[(first, uniform_png(100.0)), (second, uniform_png(7.0))])
        .with_latency(Duration::from_millis(200));
    let (mut factory, mut rx) = TerrainFactory::from_config(config(4, 1.0), Arc::new(source));

    let slot = factory.load_tile(first, 1.0, 6).unwrap();
    factory.release(slot);
    assert_eq!(factory.load_tile(second, 1.0, 6).unwrap(), slot);
    factory.run_until_idle().await;

    let events = drain(&mut rx);
    assert!(events.iter().all(|e| e.tile() == second));
    assert_eq!(ready_events(&events), 1);

    let mesh = factory.tile(slot).unwrap().mesh().unwrap();
    assert!(mesh.vertices.iter().all(|v| v.y == 7.0));
}

// ============================================================================
// Mesh generation
// ============================================================================

/// All-zero heights produce a flat mesh.
#[tokio::test]
async fn test_zero_heights_give_flat_mesh() {
    let (mut factory, _rx) = TerrainFactory::from_config(
        config(10, 5.0),
        Arc::new(source_with(&[(tile_id(), uniform_png(0.0))])),
    );

    let slot = factory.load_tile(tile_id(), SCALE, 6).unwrap();
    factory.run_until_idle().await;

    let mesh = factory.tile(slot).unwrap().mesh().unwrap();
    assert_eq!(mesh.vertex_count(), 6 * 81);
    assert!(mesh.vertices.iter().all(|v| v.y == 0.0));
}

/// Four samples, uniform height 10 and exaggeration 2 put every vertex at 20.
#[tokio::test]
async fn test_uniform_height_with_exaggeration() {
    let (mut factory, _rx, snapshots) = observed_factory(
        config(4, 2.0),
        source_with(&[(tile_id(), uniform_png(10.0))]),
    );

    let slot = factory.load_tile(tile_id(), 1.0, 6).unwrap();
    factory.run_until_idle().await;

    let mesh = factory.tile(slot).unwrap().mesh().unwrap();
    assert_eq!(mesh.vertex_count(), 54);
    assert!(mesh.vertices.iter().all(|v| v.y == 20.0));

    let snapshot = snapshots.lock()[slot.0].lock().clone();
    assert!(snapshot.active);
    assert_eq!(snapshot.mesh.as_ref(), Some(mesh));
    assert!(snapshot.texture.is_some());
    assert!(snapshot.collider.is_none());
}

/// Running generation twice without new data changes nothing.
#[tokio::test]
async fn test_regeneration_is_idempotent() {
    let west = tile_id();
    let east = west.east().unwrap();
    let (mut factory, _rx) = TerrainFactory::from_config(
        config(8, 1.5),
        Arc::new(source_with(&[(west, sloped_png(10.0)), (east, sloped_png(500.0))])),
    );

    factory.load_tile(west, SCALE, 6).unwrap();
    factory.run_until_idle().await;
    let slot = factory.load_tile(east, SCALE, 6).unwrap();
    factory.run_until_idle().await;

    let first = factory.tile(slot).unwrap().mesh().unwrap().clone();
    factory.regenerate(slot).unwrap();
    factory.regenerate(slot).unwrap();

    assert_eq!(factory.tile(slot).unwrap().mesh().unwrap(), &first);
}

// ============================================================================
// Stitching
// ============================================================================

/// The east tile's west column equals the west tile's east column.
#[tokio::test]
async fn test_west_east_seam_matches() {
    let west = tile_id();
    let east = west.east().unwrap();
    let (mut factory, _rx) = TerrainFactory::from_config(
        config(9, 1.0),
        Arc::new(source_with(&[(west, sloped_png(0.0)), (east, sloped_png(900.0))])),
    );

    let west_slot = factory.load_tile(west, SCALE, 6).unwrap();
    factory.run_until_idle().await;
    let west_before = factory.tile(west_slot).unwrap().mesh().unwrap().clone();

    let east_slot = factory.load_tile(east, SCALE, 6).unwrap();
    factory.run_until_idle().await;

    let layout = GridLayout::new(9).unwrap();
    let west_mesh = factory.tile(west_slot).unwrap().mesh().unwrap();
    let east_mesh = factory.tile(east_slot).unwrap().mesh().unwrap();
    for gy in 0..=layout.cap() {
        assert_eq!(
            layout.height_at(west_mesh, layout.cap(), gy),
            layout.height_at(east_mesh, 0, gy),
            "seam row {}",
            gy
        );
    }

    // The earlier tile is not regenerated
    assert_eq!(west_mesh, &west_before);
    // Away from the seam the east tile keeps its own terrain
    assert_ne!(
        layout.height_at(east_mesh, 1, 0),
        layout.height_at(west_mesh, layout.cap(), 0)
    );
}

/// A block of tiles generated row by row is seamless along every shared edge
/// to an earlier tile.
#[tokio::test]
async fn test_block_of_tiles_stitches_to_earlier_neighbours() {
    let origin = tile_id();
    let ids: Vec<TileId> = (0..3)
        .flat_map(|dy| (0..3).map(move |dx| TileId::new(6, origin.x + dx, origin.y + dy).unwrap()))
        .collect();
    let tiles: Vec<(TileId, Vec<u8>)> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, sloped_png(i as f32 * 100.0)))
        .collect();
    let source = Arc::new(source_with(&tiles));
    let (mut factory, _rx) = TerrainFactory::from_config(config(5, 1.0), source);

    for id in &ids {
        factory.load_tile(*id, SCALE, 6).unwrap();
        factory.run_until_idle().await;
    }

    let layout = GridLayout::new(5).unwrap();
    let cap = layout.cap();
    let mesh = |id: TileId| {
        factory
            .tile(factory.slot_for(id).unwrap())
            .unwrap()
            .mesh()
            .unwrap()
            .clone()
    };

    for id in &ids {
        let ours = mesh(*id);
        if let Some(north) = id.north().filter(|n| ids.contains(n)) {
            let theirs = mesh(north);
            for i in 0..=cap {
                assert_eq!(layout.height_at(&ours, i, 0), layout.height_at(&theirs, i, cap));
            }
        }
        if let Some(west) = id.west().filter(|w| ids.contains(w)) {
            let theirs = mesh(west);
            for i in 0..=cap {
                assert_eq!(layout.height_at(&ours, 0, i), layout.height_at(&theirs, cap, i));
            }
        }
    }
    assert_eq!(factory.mesh_cache().unwrap().len(), 9);
}
