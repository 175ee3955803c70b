//! Terrain settings.
//!
//! Each struct maps onto one `[section]` of the INI config file.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use crate::mesh::{MAX_SAMPLE_COUNT, MIN_SAMPLE_COUNT};
use crate::tile::{ChannelSet, DataChannel};

/// Largest accepted height exaggeration.
pub const MAX_EXAGGERATION: f32 = 100.0;

/// Latitude limit of the Web Mercator projection, in degrees.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Which mesh tiles are rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TerrainKind {
    /// Undisplaced quad
    Flat,
    /// Height-displaced grid with per-face normals
    #[default]
    LowPoly,
}

impl fmt::Display for TerrainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerrainKind::Flat => f.write_str("flat"),
            TerrainKind::LowPoly => f.write_str("lowpoly"),
        }
    }
}

impl FromStr for TerrainKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(TerrainKind::Flat),
            "lowpoly" | "low_poly" | "low-poly" => Ok(TerrainKind::LowPoly),
            other => Err(format!("unknown terrain kind '{}'", other)),
        }
    }
}

/// Elevation and mesh options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationOptions {
    pub terrain: TerrainKind,
    /// Grid points along one tile edge
    pub sample_count: usize,
    pub exaggeration_factor: f32,
    /// Scale heights by `1 / cos(center latitude)`
    pub use_relative_height: bool,
    /// Also push generated meshes as colliders
    pub add_collider: bool,
}

impl Default for ElevationOptions {
    fn default() -> Self {
        Self {
            terrain: TerrainKind::LowPoly,
            sample_count: 10,
            exaggeration_factor: 1.0,
            use_relative_height: false,
            add_collider: false,
        }
    }
}

impl ElevationOptions {
    pub fn with_terrain(mut self, terrain: TerrainKind) -> Self {
        self.terrain = terrain;
        self
    }

    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_exaggeration(mut self, factor: f32) -> Self {
        self.exaggeration_factor = factor;
        self
    }

    pub fn with_relative_height(mut self, enabled: bool) -> Self {
        self.use_relative_height = enabled;
        self
    }

    pub fn with_collider(mut self, enabled: bool) -> Self {
        self.add_collider = enabled;
        self
    }
}

/// Imagery decoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    pub use_mipmap: bool,
    /// BC1 block compression
    pub use_compression: bool,
    pub use_retina: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            use_mipmap: false,
            use_compression: false,
            use_retina: true,
        }
    }
}

impl RasterOptions {
    pub fn with_mipmap(mut self, enabled: bool) -> Self {
        self.use_mipmap = enabled;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    pub fn with_retina(mut self, enabled: bool) -> Self {
        self.use_retina = enabled;
        self
    }
}

/// Datasets requested per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    pub raster_map_id: String,
    pub height_map_id: String,
    pub vector_map_id: String,
    /// Channels fetched for every tile
    pub channels: ChannelSet,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            raster_map_id: "mapbox.satellite".to_string(),
            height_map_id: "mapbox.terrain-rgb".to_string(),
            vector_map_id: "mapbox.mapbox-streets-v7".to_string(),
            channels: ChannelSet::all(),
        }
    }
}

impl SourceOptions {
    pub fn map_id(&self, channel: DataChannel) -> &str {
        match channel {
            DataChannel::Raster => &self.raster_map_id,
            DataChannel::Height => &self.height_map_id,
            DataChannel::Vector => &self.vector_map_id,
        }
    }

    pub fn with_map_id(mut self, channel: DataChannel, map_id: impl Into<String>) -> Self {
        let map_id = map_id.into();
        match channel {
            DataChannel::Raster => self.raster_map_id = map_id,
            DataChannel::Height => self.height_map_id = map_id,
            DataChannel::Vector => self.vector_map_id = map_id,
        }
        self
    }

    pub fn with_channels(mut self, channels: ChannelSet) -> Self {
        self.channels = channels;
        self
    }
}

/// Map context tiles are placed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapFrame {
    /// Latitude of the map center in degrees
    pub center_latitude: f64,
    /// Zoom level the map was created at
    pub initial_zoom: u8,
}

impl Default for MapFrame {
    fn default() -> Self {
        Self {
            center_latitude: 0.0,
            initial_zoom: 0,
        }
    }
}

/// Log output location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(crate::logging::default_log_dir()),
            file: crate::logging::default_log_file().to_string(),
        }
    }
}

/// Everything the terrain pipeline is configured with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TerrainConfig {
    pub elevation: ElevationOptions,
    pub raster: RasterOptions,
    pub source: SourceOptions,
    pub map: MapFrame,
}

impl TerrainConfig {
    pub fn with_elevation(mut self, elevation: ElevationOptions) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_raster(mut self, raster: RasterOptions) -> Self {
        self.raster = raster;
        self
    }

    pub fn with_source(mut self, source: SourceOptions) -> Self {
        self.source = source;
        self
    }

    pub fn with_map(mut self, map: MapFrame) -> Self {
        self.map = map;
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFileError::InvalidValue` naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        let elevation = &self.elevation;
        if !(MIN_SAMPLE_COUNT..=MAX_SAMPLE_COUNT).contains(&elevation.sample_count) {
            return Err(invalid(
                "elevation",
                "sample_count",
                elevation.sample_count,
                format!("must be between {} and {}", MIN_SAMPLE_COUNT, MAX_SAMPLE_COUNT),
            ));
        }
        if !(0.0..=MAX_EXAGGERATION).contains(&elevation.exaggeration_factor) {
            return Err(invalid(
                "elevation",
                "exaggeration_factor",
                elevation.exaggeration_factor,
                format!("must be between 0 and {}", MAX_EXAGGERATION),
            ));
        }
        if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.map.center_latitude) {
            return Err(invalid(
                "map",
                "center_latitude",
                self.map.center_latitude,
                format!("must be within ±{:.4} degrees", MAX_LATITUDE),
            ));
        }
        if self.map.initial_zoom > crate::coord::MAX_ZOOM {
            return Err(invalid(
                "map",
                "initial_zoom",
                self.map.initial_zoom,
                format!("must be at most {}", crate::coord::MAX_ZOOM),
            ));
        }
        for channel in DataChannel::ALL {
            if self.source.channels.contains(channel)
                && self.source.map_id(channel).trim().is_empty()
            {
                return Err(invalid(
                    "source",
                    &format!("{}_map_id", channel),
                    "",
                    "must not be empty for an enabled channel".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(section: &str, key: &str, value: impl fmt::Display, reason: String) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}
