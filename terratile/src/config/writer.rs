//! INI serialization: `ConfigFile` → commented INI string.

use super::file::ConfigFile;
use crate::tile::DataChannel;

/// Convert a `ConfigFile` to a commented INI string for saving or display.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let terrain = &config.terrain;
    let channels = DataChannel::ALL
        .into_iter()
        .filter(|c| terrain.source.channels.contains(*c))
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"[elevation]
; Mesh kind: flat or lowpoly
terrain = {}
; Grid points along one tile edge (2-256)
sample_count = {}
; Height multiplier (0-100)
exaggeration_factor = {}
; Scale heights by 1/cos(center latitude)
use_relative_height = {}
; Push generated meshes as colliders
add_collider = {}

[raster]
use_mipmap = {}
; BC1 block compression
use_compression = {}
use_retina = {}

[source]
raster_map_id = {}
height_map_id = {}
vector_map_id = {}
; Channels fetched per tile: raster, height, vector
channels = {}

[map]
; Degrees, within the Web Mercator range
center_latitude = {}
initial_zoom = {}

[logging]
directory = {}
file = {}
"#,
        terrain.elevation.terrain,
        terrain.elevation.sample_count,
        terrain.elevation.exaggeration_factor,
        terrain.elevation.use_relative_height,
        terrain.elevation.add_collider,
        terrain.raster.use_mipmap,
        terrain.raster.use_compression,
        terrain.raster.use_retina,
        terrain.source.raster_map_id,
        terrain.source.height_map_id,
        terrain.source.vector_map_id,
        channels,
        terrain.map.center_latitude,
        terrain.map.initial_zoom,
        config.logging.directory.display(),
        config.logging.file,
    )
}
