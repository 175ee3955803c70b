//! Terratile - map tile terrain meshing
//!
//! This library loads map tiles over three asynchronous data channels (raster
//! imagery, terrain-RGB elevation and vector features), decides when a tile
//! has enough data to be meshed, builds a low-poly terrain mesh for it, and
//! stitches the mesh seams against already generated neighbours.
//!
//! The usual entry point is [`factory::TerrainFactory`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use terratile::config::TerrainConfig;
//! use terratile::coord::TileId;
//! use terratile::factory::TerrainFactory;
//! use terratile::fetch::FileSystemSource;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(FileSystemSource::new("tiles"));
//! let (mut factory, mut events) = TerrainFactory::from_config(TerrainConfig::default(), source);
//!
//! factory.load_tile(TileId::new(12, 2200, 1343)?, 1.0e-3, 12)?;
//! factory.run_until_idle().await;
//!
//! while let Ok(event) = events.try_recv() {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coord;
pub mod factory;
pub mod fetch;
pub mod logging;
pub mod mesh;
pub mod render;
pub mod tile;
