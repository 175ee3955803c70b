//! Configuration for the terrain pipeline.
//!
//! [`TerrainConfig`] groups elevation, raster, source and map settings, each
//! with defaults and `with_*` builders. [`ConfigFile`] loads them from an INI
//! file and adds logging settings.
//!
//! # Example
//!
//! ```
//! use terratile::config::{ElevationOptions, TerrainConfig};
//!
//! let config = TerrainConfig::default()
//!     .with_elevation(ElevationOptions::default().with_sample_count(16));
//! assert!(config.validate().is_ok());
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use settings::{
    ElevationOptions, LoggingSettings, MapFrame, RasterOptions, SourceOptions, TerrainConfig,
    TerrainKind, MAX_EXAGGERATION, MAX_LATITUDE,
};
