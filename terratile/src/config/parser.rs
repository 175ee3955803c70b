//! INI parsing: `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};
use super::settings::TerrainKind;
use crate::tile::ChannelSet;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the
/// INI, then validates the result.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [elevation] section
    if let Some(section) = ini.section(Some("elevation")) {
        let elevation = &mut config.terrain.elevation;
        if let Some(v) = section.get("terrain") {
            elevation.terrain = v.parse::<TerrainKind>().map_err(|_| {
                invalid("elevation", "terrain", v, "must be 'flat' or 'lowpoly'")
            })?;
        }
        parse_into(
            section,
            "elevation",
            "sample_count",
            &mut elevation.sample_count,
            "must be a positive integer",
        )?;
        parse_into(
            section,
            "elevation",
            "exaggeration_factor",
            &mut elevation.exaggeration_factor,
            "must be a number",
        )?;
        parse_bool(
            section,
            "elevation",
            "use_relative_height",
            &mut elevation.use_relative_height,
        )?;
        parse_bool(section, "elevation", "add_collider", &mut elevation.add_collider)?;
    }

    // [raster] section
    if let Some(section) = ini.section(Some("raster")) {
        let raster = &mut config.terrain.raster;
        parse_bool(section, "raster", "use_mipmap", &mut raster.use_mipmap)?;
        parse_bool(section, "raster", "use_compression", &mut raster.use_compression)?;
        parse_bool(section, "raster", "use_retina", &mut raster.use_retina)?;
    }

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        let source = &mut config.terrain.source;
        for (key, field) in [
            ("raster_map_id", &mut source.raster_map_id),
            ("height_map_id", &mut source.height_map_id),
            ("vector_map_id", &mut source.vector_map_id),
        ] {
            if let Some(v) = section.get(key) {
                *field = v.trim().to_string();
            }
        }
        if let Some(v) = section.get("channels") {
            source.channels = parse_channels(v)?;
        }
    }

    // [map] section
    if let Some(section) = ini.section(Some("map")) {
        let map = &mut config.terrain.map;
        parse_into(
            section,
            "map",
            "center_latitude",
            &mut map.center_latitude,
            "must be a number in degrees",
        )?;
        parse_into(
            section,
            "map",
            "initial_zoom",
            &mut map.initial_zoom,
            "must be an integer zoom level",
        )?;
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    config.terrain.validate()?;
    Ok(config)
}

fn parse_into<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    target: &mut T,
    reason: &str,
) -> Result<(), ConfigFileError> {
    if let Some(v) = section.get(key) {
        *target = v
            .trim()
            .parse()
            .map_err(|_| invalid(section_name, key, v, reason))?;
    }
    Ok(())
}

fn parse_bool(
    section: &Properties,
    section_name: &str,
    key: &str,
    target: &mut bool,
) -> Result<(), ConfigFileError> {
    if let Some(v) = section.get(key) {
        *target = match v.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => return Err(invalid(section_name, key, v, "must be true or false")),
        };
    }
    Ok(())
}

/// Comma separated list of channel names, e.g. `raster, height`.
fn parse_channels(value: &str) -> Result<ChannelSet, ConfigFileError> {
    let mut channels = ChannelSet {
        raster: false,
        height: false,
        vector: false,
    };
    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.to_lowercase().as_str() {
            "raster" => channels.raster = true,
            "height" => channels.height = true,
            "vector" => channels.vector = true,
            _ => {
                return Err(invalid(
                    "source",
                    "channels",
                    value,
                    "must list raster, height and/or vector",
                ))
            }
        }
    }
    Ok(channels)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapFrame;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_is_default() {
        let config = parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_overlay_values() {
        let config = parse(
            "[elevation]\n\
             terrain = flat\n\
             sample_count = 16\n\
             exaggeration_factor = 2.5\n\
             use_relative_height = yes\n\
             [raster]\n\
             use_retina = false\n\
             [source]\n\
             height_map_id = local.dem\n\
             channels = height, raster\n\
             [map]\n\
             center_latitude = 47.5\n\
             initial_zoom = 12\n",
        )
        .unwrap();

        let terrain = &config.terrain;
        assert_eq!(terrain.elevation.terrain, TerrainKind::Flat);
        assert_eq!(terrain.elevation.sample_count, 16);
        assert_eq!(terrain.elevation.exaggeration_factor, 2.5);
        assert!(terrain.elevation.use_relative_height);
        assert!(!terrain.raster.use_retina);
        assert_eq!(terrain.source.height_map_id, "local.dem");
        assert!(!terrain.source.channels.vector);
        assert!(terrain.source.channels.height);
        assert_eq!(
            terrain.map,
            MapFrame {
                center_latitude: 47.5,
                initial_zoom: 12
            }
        );
    }

    #[test]
    fn test_bad_number_names_key() {
        match parse("[elevation]\nsample_count = lots\n") {
            Err(ConfigFileError::InvalidValue {
                section,
                key,
                value,
                ..
            }) => {
                assert_eq!(section, "elevation");
                assert_eq!(key, "sample_count");
                assert_eq!(value, "lots");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        assert!(parse("[elevation]\nsample_count = 1000\n").is_err());
    }

    #[test]
    fn test_bad_bool() {
        assert!(parse("[raster]\nuse_mipmap = maybe\n").is_err());
    }

    #[test]
    fn test_bad_channel() {
        assert!(parse("[source]\nchannels = raster, terrain\n").is_err());
    }

    #[test]
    fn test_logging_section() {
        let config = parse("[logging]\ndirectory = /var/log/terratile\nfile = run.log\n").unwrap();
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/terratile"));
        assert_eq!(config.logging.file, "run.log");
    }
}
