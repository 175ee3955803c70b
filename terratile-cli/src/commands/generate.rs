//! `generate` command: write a synthetic tile directory.
//!
//! Heights come from a smooth function of the global pixel position, so
//! adjacent tiles agree along their shared edges before any stitching.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use clap::Args;
use image::{ImageBuffer, ImageFormat, Rgba};
use terratile::config::TerrainConfig;
use terratile::coord::{CanonicalTileId, TileId};
use terratile::tile::{encode_terrain_rgb_png, DataChannel};
use tracing::info;

use super::block_around;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Directory to write tiles into
    #[arg(long)]
    pub output: PathBuf,

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

    /// Pixels along each image edge
    #[arg(long, default_value = "64")]
    pub resolution: u32,

    /// Height added to every sample, in metres
    #[arg(long, default_value = "200", allow_negative_numbers = true)]
    pub base_height: f32,
}

pub fn run(args: GenerateArgs, config: &TerrainConfig) -> Result<(), CliError> {
    let center = TileId::new(args.zoom, args.x, args.y)?;
    let tiles = block_around(center, args.radius)?;

    for id in &tiles {
        write_tile(&args, config, id.canonical())?;
    }

    info!(tiles = tiles.len(), output = %args.output.display(), "Synthetic tiles written");
    println!(
        "Wrote {} tiles ({}x{} px) to {}",
        tiles.len(),
        args.resolution,
        args.resolution,
        args.output.display()
    );
    Ok(())
}

fn write_tile(
    args: &GenerateArgs,
    config: &TerrainConfig,
    tile: CanonicalTileId,
) -> Result<(), CliError> {
    let res = args.resolution;
    let origin_x = tile.x as f64 * res as f64;
    let origin_y = tile.y as f64 * res as f64;
    let height_at = |col: u32, row: u32| {
        args.base_height + relief(origin_x + col as f64, origin_y + row as f64)
    };

    if config.source.channels.contains(DataChannel::Height) {
        let png = encode_terrain_rgb_png(res, &height_at)?;
        let path = tile_path(&args.output, config, DataChannel::Height, tile);
        write_file(&path, &png)?;
    }

    if config.source.channels.contains(DataChannel::Raster) {
        let image = ImageBuffer::from_fn(res, res, |col, row| {
            Rgba(ramp(height_at(col, row) - args.base_height))
        });
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        let path = tile_path(&args.output, config, DataChannel::Raster, tile);
        write_file(&path, &png.into_inner())?;
    }

    Ok(())
}

/// Rolling hills, roughly -210..210 m.
fn relief(gx: f64, gy: f64) -> f32 {
    let hills = 150.0 * (gx / 37.0).sin() * (gy / 53.0).cos();
    let ridges = 60.0 * ((gx + gy) / 19.0).sin();
    (hills + ridges) as f32
}

/// Colour for a relief value: green valleys, brown slopes, pale tops.
fn ramp(relief: f32) -> [u8; 4] {
    let t = ((relief + 210.0) / 420.0).clamp(0.0, 1.0);
    let lerp = |a: f32, b: f32, t: f32| (a + (b - a) * t) as u8;
    if t < 0.5 {
        let t = t * 2.0;
        [lerp(60.0, 140.0, t), lerp(120.0, 110.0, t), lerp(50.0, 70.0, t), 255]
    } else {
        let t = (t - 0.5) * 2.0;
        [lerp(140.0, 235.0, t), lerp(110.0, 230.0, t), lerp(70.0, 225.0, t), 255]
    }
}

fn tile_path(
    root: &Path,
    config: &TerrainConfig,
    channel: DataChannel,
    tile: CanonicalTileId,
) -> PathBuf {
    root.join(config.source.map_id(channel))
        .join(tile.z.to_string())
        .join(tile.x.to_string())
        .join(format!("{}.{}", tile.y, channel.extension()))
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), CliError> {
    let to_error = |error| CliError::FileWrite {
        path: path.to_path_buf(),
        error,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_error)?;
    }
    std::fs::write(path, data).map_err(to_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use terratile::tile::decode_terrain_rgb;

    fn args(output: &Path) -> GenerateArgs {
        GenerateArgs {
            output: output.to_path_buf(),
            zoom: 5,
            x: 10,
            y: 12,
            radius: 1,
            resolution: 16,
            base_height: 200.0,
        }
    }

    #[test]
    fn test_generate_writes_block_for_enabled_channels() {
        let dir = TempDir::new().unwrap();
        let config = TerrainConfig::default();

        run(args(dir.path()), &config).unwrap();

        let height = dir.path().join("mapbox.terrain-rgb/5/10/12.png");
        let raster = dir.path().join("mapbox.satellite/5/9/11.png");
        assert!(height.exists());
        assert!(raster.exists());
        assert!(!dir.path().join("mapbox.mapbox-streets-v7").exists());
    }

    #[test]
    fn test_generated_heights_decode_near_function() {
        let dir = TempDir::new().unwrap();
        let config = TerrainConfig::default();
        run(args(dir.path()), &config).unwrap();

        let data = std::fs::read(dir.path().join("mapbox.terrain-rgb/5/10/12.png")).unwrap();
        let grid = decode_terrain_rgb(&data).unwrap();

        assert_eq!(grid.resolution(), 16);
        let expected = 200.0 + relief(10.0 * 16.0, 12.0 * 16.0);
        assert!((grid.samples()[0] - expected).abs() <= 0.1);
    }

    #[test]
    fn test_relief_is_continuous_across_tiles() {
        // Last column of one tile and first column of the next are one pixel apart
        let a = relief(15.0, 3.0);
        let b = relief(16.0, 3.0);
        assert!((a - b).abs() < 20.0);
    }
}
