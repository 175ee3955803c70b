//! `mesh` command: load a block of tiles from disk and mesh them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, ValueEnum};
use terratile::config::{MapFrame, TerrainConfig, TerrainKind};
use terratile::coord::{tile_center_latitude, TileId};
use terratile::factory::{MapEvent, TerrainFactory};
use terratile::fetch::FileSystemSource;
use terratile::mesh::MeshData;
use terratile::tile::Tile;
use tracing::{debug, info};

use super::block_around;
use crate::error::CliError;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TerrainArg {
    /// Flat quad, no elevation
    Flat,
    /// Height-displaced grid stitched to its neighbours
    LowPoly,
}

impl From<TerrainArg> for TerrainKind {
    fn from(arg: TerrainArg) -> Self {
        match arg {
            TerrainArg::Flat => TerrainKind::Flat,
            TerrainArg::LowPoly => TerrainKind::LowPoly,
        }
    }
}

#[derive(Debug, Args)]
pub struct MeshArgs {
    /// Tile directory laid out as <map_id>/<z>/<x>/<y>.<ext>
    #[arg(long)]
    pub source: PathBuf,

    /// Zoom level
    #[arg(long)]
    pub zoom: u8,

    /// Column of the centre tile
    #[arg(long, allow_negative_numbers = true)]
    pub x: i32,

    /// Row of the centre tile
    #[arg(long)]
    pub y: i32,

    /// Tiles on each side of the centre tile (at most 32)
    #[arg(long, default_value = "1")]
    pub radius: u32,

    /// Terrain kind (overrides the configuration)
    #[arg(long, value_enum)]
    pub terrain: Option<TerrainArg>,

    /// Grid samples along each tile edge (overrides the configuration)
    #[arg(long)]
    pub sample_count: Option<usize>,

    /// Height exaggeration (overrides the configuration)
    #[arg(long)]
    pub exaggeration: Option<f32>,

    /// Scale heights by the latitude of the centre tile
    #[arg(long)]
    pub relative_height: bool,

    /// World units per Mercator metre
    #[arg(long, default_value = "0.001")]
    pub scale: f32,

    /// Write all meshes to a Wavefront OBJ file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: MeshArgs, config: TerrainConfig) -> Result<(), CliError> {
    let center = TileId::new(args.zoom, args.x, args.y)?;
    let config = apply_overrides(&args, config, center);
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    runtime.block_on(run_block(args, config, center))
}

fn apply_overrides(args: &MeshArgs, mut config: TerrainConfig, center: TileId) -> TerrainConfig {
    if let Some(terrain) = args.terrain {
        config.elevation.terrain = terrain.into();
    }
    if let Some(sample_count) = args.sample_count {
        config.elevation.sample_count = sample_count;
    }
    if let Some(exaggeration) = args.exaggeration {
        config.elevation.exaggeration_factor = exaggeration;
    }
    if args.relative_height {
        config.elevation.use_relative_height = true;
    }
    config.map = MapFrame {
        center_latitude: tile_center_latitude(&center),
        initial_zoom: center.z,
    };
    config
}

async fn run_block(args: MeshArgs, config: TerrainConfig, center: TileId) -> Result<(), CliError> {
    let tiles = block_around(center, args.radius)?;
    let source = Arc::new(FileSystemSource::new(&args.source));
    let (mut factory, mut events) = TerrainFactory::from_config(config, source);

    info!(
        center = %center,
        tiles = tiles.len(),
        source = %args.source.display(),
        "Meshing tile block"
    );

    // One tile at a time so every tile stitches against the finished tiles
    // before it in row-major order
    for id in &tiles {
        factory.load_tile(*id, args.scale, center.z)?;
        factory.run_until_idle().await;
    }

    let mut failures = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            MapEvent::FetchError(_)
            | MapEvent::DecodeError { .. }
            | MapEvent::MeshFailed { .. } => {
                failures += 1;
                println!("  ! {}", event);
            }
            _ => debug!(event = %event, "Map event"),
        }
    }

    println!();
    println!(
        "{:<16} {:<10} {:<10} {:<10} {:>8} {:>20}",
        "TILE", "RASTER", "HEIGHT", "VECTOR", "VERTS", "HEIGHT RANGE"
    );
    for id in &tiles {
        if let Some(tile) = factory.slot_for(*id).and_then(|slot| factory.tile(slot)) {
            print_tile(tile);
        }
    }
    println!();
    println!("{} tiles, {} problems", tiles.len(), failures);

    if let Some(path) = &args.output {
        let placed = tiles.iter().filter_map(|id| {
            let tile = factory.tile(factory.slot_for(*id)?)?;
            Some((*id, tile))
        });
        let written = write_obj(path, center, placed)?;
        println!("Wrote {} meshes to {}", written, path.display());
    }

    Ok(())
}

fn print_tile(tile: &Tile) {
    let states = tile.states();
    let id = tile.id().map(|id| id.to_string()).unwrap_or_default();
    let (verts, range) = match tile.mesh() {
        Some(mesh) => {
            let (lo, hi) = mesh.height_range();
            (mesh.vertex_count().to_string(), format!("{:.3}..{:.3}", lo, hi))
        }
        None => ("-".to_string(), "-".to_string()),
    };
    println!(
        "{:<16} {:<10} {:<10} {:<10} {:>8} {:>20}",
        id,
        states.raster().to_string(),
        states.height().to_string(),
        states.vector().to_string(),
        verts,
        range
    );
}

/// Write every meshed tile as an OBJ object, placed relative to `center`.
///
/// Returns the number of meshes written.
fn write_obj<'a>(
    path: &Path,
    center: TileId,
    tiles: impl Iterator<Item = (TileId, &'a Tile)>,
) -> Result<usize, CliError> {
    let to_error = |error| CliError::FileWrite {
        path: path.to_path_buf(),
        error,
    };

    let file = File::create(path).map_err(to_error)?;
    let mut out = BufWriter::new(file);
    let mut written = 0;
    let mut base = 1;

    for (id, tile) in tiles {
        let (Some(mesh), Some(kind)) = (tile.mesh(), tile.terrain_kind()) else {
            continue;
        };
        let dx = (id.x - center.x) as f32 * kind.extent;
        let dz = (center.y - id.y) as f32 * kind.extent;
        let name = format!("tile_{}_{}_{}", id.z, id.x, id.y);
        write_object(&mut out, &name, mesh, dx, dz, base).map_err(to_error)?;
        base += mesh.vertex_count();
        written += 1;
    }

    out.flush().map_err(to_error)?;
    Ok(written)
}

fn write_object(
    out: &mut impl Write,
    name: &str,
    mesh: &MeshData,
    dx: f32,
    dz: f32,
    base: usize,
) -> std::io::Result<()> {
    writeln!(out, "o {}", name)?;
    for v in &mesh.vertices {
        writeln!(out, "v {} {} {}", v.x + dx, v.y, v.z + dz)?;
    }
    for n in &mesh.normals {
        writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    for face in mesh.triangles.chunks_exact(3) {
        let [a, b, c] = [face[0], face[1], face[2]].map(|i| i as usize + base);
        writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
    }
    Ok(())
}
