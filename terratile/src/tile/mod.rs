//! Map tiles and their data channels.
//!
//! Every tile receives up to three independent payloads (raster imagery,
//! terrain-RGB elevation and vector features). Each channel moves through its
//! own [`ChannelState`] machine, and the tile combines the raster and height
//! states into a single readiness signal for mesh generation.

mod error;
mod events;
mod height;
mod map_tile;
mod raster;
mod state;
mod vector;

pub use error::TileDataError;
pub use events::{ObserverList, TileEvent, TileEventKind, TileObserver, TileSlot};
pub use height::{
    color_from_height, decode_terrain_rgb, encode_terrain_rgb_png, height_from_color, HeightGrid,
};
pub use map_tile::Tile;
pub use raster::{decode_raster, RasterImage, TextureFormat};
pub use state::{ChannelSet, ChannelState, ChannelStates, DataChannel};
pub use vector::VectorTileData;
