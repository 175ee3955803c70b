//! Raster imagery payloads.
//!
//! Decodes fetched imagery into an RGBA texture with an optional mip chain and
//! optional BC1 block compression.

use image::{Rgba, RgbaImage};
use tracing::debug;

use super::{DataChannel, TileDataError};

/// Pixel layout of a decoded raster level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// 4 bytes per pixel
    Rgba8,
    /// 8 bytes per 4×4 block
    Bc1,
}

/// Displayable texture handed to the render target.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    format: TextureFormat,
    /// Level 0 first, each following level half the size.
    levels: Vec<Vec<u8>>,
}

impl RasterImage {
    /// Wrap an already decoded image as a single-level RGBA texture.
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            format: TextureFormat::Rgba8,
            levels: vec![image.into_raw()],
        }
    }

    /// Solid-colour texture, used as a loading placeholder.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::from_rgba(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Number of mip levels including the full-size image.
    pub fn mip_count(&self) -> usize {
        self.levels.len()
    }

    /// Raw bytes of one mip level.
    pub fn level(&self, index: usize) -> Option<&[u8]> {
        self.levels.get(index).map(Vec::as_slice)
    }
}

/// Decode fetched imagery.
///
/// `use_mipmap` builds a box-filtered chain down to 1×1. `use_compression`
/// BC1-compresses every level whose dimensions are multiples of 4; when the
/// base level cannot be compressed the texture stays RGBA.
pub fn decode_raster(
    data: &[u8],
    use_mipmap: bool,
    use_compression: bool,
) -> Result<RasterImage, TileDataError> {
    let base = image::load_from_memory(data)
        .map_err(|source| TileDataError::Image {
            channel: DataChannel::Raster,
            source,
        })?
        .to_rgba8();

    let (width, height) = base.dimensions();
    let chain = if use_mipmap {
        mip_chain(base)
    } else {
        vec![base]
    };

    let compressible = width % 4 == 0 && height % 4 == 0;
    if use_compression && !compressible {
        debug!(width, height, "Raster dimensions not block aligned, skipping compression");
    }

    if use_compression && compressible {
        let levels = chain
            .iter()
            .take_while(|level| level.width() % 4 == 0 && level.height() % 4 == 0)
            .map(compress_bc1)
            .collect();
        return Ok(RasterImage {
            width,
            height,
            format: TextureFormat::Bc1,
            levels,
        });
    }

    Ok(RasterImage {
        width,
        height,
        format: TextureFormat::Rgba8,
        levels: chain.into_iter().map(RgbaImage::into_raw).collect(),
    })
}

/// Full mip chain: `[original, half, quarter, …, 1×1]`.
fn mip_chain(source: RgbaImage) -> Vec<RgbaImage> {
    let mut levels = vec![source];
    loop {
        let last = &levels[levels.len() - 1];
        if last.width() <= 1 && last.height() <= 1 {
            break;
        }
        let next = downsample_box_2x(last);
        levels.push(next);
    }
    levels
}

/// Halve an image, averaging each 2×2 block.
fn downsample_box_2x(source: &RgbaImage) -> RgbaImage {
    let width = (source.width() / 2).max(1);
    let height = (source.height() / 2).max(1);
    let max_x = source.width() - 1;
    let max_y = source.height() - 1;

    RgbaImage::from_fn(width, height, |x, y| {
        let x0 = (x * 2).min(max_x);
        let y0 = (y * 2).min(max_y);
        let x1 = (x * 2 + 1).min(max_x);
        let y1 = (y * 2 + 1).min(max_y);

        let block = [
            source.get_pixel(x0, y0),
            source.get_pixel(x1, y0),
            source.get_pixel(x0, y1),
            source.get_pixel(x1, y1),
        ];
        let mut avg = [0u8; 4];
        for (channel, out) in avg.iter_mut().enumerate() {
            let sum: u16 = block.iter().map(|p| p[channel] as u16).sum();
            *out = (sum / 4) as u8;
        }
        Rgba(avg)
    })
}

fn compress_bc1(level: &RgbaImage) -> Vec<u8> {
    let surface = intel_tex_2::RgbaSurface {
        width: level.width(),
        height: level.height(),
        stride: level.width() * 4,
        data: level.as_raw(),
    };
    intel_tex_2::bc1::compress_blocks(&surface)
}
