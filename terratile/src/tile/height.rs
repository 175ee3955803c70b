//! Elevation samples decoded from terrain-RGB imagery.
//!
//! Terrain-RGB packs an elevation into the three colour channels of a pixel:
//!
//! ```text
//! height = -10000 + (R × 256² + G × 256 + B) × 0.1
//! ```
//!
//! Row 0 of the grid is the northern edge of the tile, column 0 the western
//! edge, matching the pixel layout of the source image.

use image::{ImageBuffer, Rgba};

use super::{DataChannel, TileDataError};

const BASE_HEIGHT: f64 = -10_000.0;
const HEIGHT_STEP: f64 = 0.1;

/// Square grid of elevation samples in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    resolution: usize,
    samples: Vec<f32>,
}

impl HeightGrid {
    /// Build a grid from row-major samples.
    ///
    /// Returns `None` when `samples` does not hold `resolution²` values.
    pub fn from_samples(resolution: usize, samples: Vec<f32>) -> Option<Self> {
        if resolution == 0 || samples.len() != resolution * resolution {
            return None;
        }
        Some(Self {
            resolution,
            samples,
        })
    }

    /// Grid where every sample has the same elevation.
    pub fn uniform(resolution: usize, height: f32) -> Self {
        let resolution = resolution.max(1);
        Self {
            resolution,
            samples: vec![height; resolution * resolution],
        }
    }

    /// Samples along one edge.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Nearest-sample lookup at tile-local coordinates.
    ///
    /// `u` runs west→east and `v` south→north, both nominally in `[0, 1]`.
    /// Indices are truncated and clamped, so out-of-range input returns the
    /// closest edge sample.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let max_index = (self.resolution - 1) as f32;
        let res = self.resolution as f32;
        let col = (u * res).clamp(0.0, max_index) as usize;
        let row = ((1.0 - v) * res).clamp(0.0, max_index) as usize;
        self.samples[row * self.resolution + col]
    }

    /// Lowest and highest sample.
    pub fn range(&self) -> (f32, f32) {
        self.samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), h| {
                (lo.min(*h), hi.max(*h))
            })
    }
}

/// Decode an encoded terrain-RGB image into a height grid.
///
/// The image must be square. The alpha channel is ignored.
pub fn decode_terrain_rgb(data: &[u8]) -> Result<HeightGrid, TileDataError> {
    let image = image::load_from_memory(data)
        .map_err(|source| TileDataError::Image {
            channel: DataChannel::Height,
            source,
        })?
        .to_rgba8();

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(TileDataError::InvalidHeightGrid {
            width,
            height,
            reason: "grid is empty",
        });
    }
    if width != height {
        return Err(TileDataError::InvalidHeightGrid {
            width,
            height,
            reason: "grid must be square",
        });
    }

    let samples = image
        .pixels()
        .map(|Rgba([r, g, b, _])| height_from_color(*r, *g, *b))
        .collect();

    Ok(HeightGrid {
        resolution: width as usize,
        samples,
    })
}

/// Elevation encoded by a single terrain-RGB pixel.
#[inline]
pub fn height_from_color(r: u8, g: u8, b: u8) -> f32 {
    let value = (r as u32) << 16 | (g as u32) << 8 | b as u32;
    (BASE_HEIGHT + value as f64 * HEIGHT_STEP) as f32
}

/// Terrain-RGB colour for an elevation, rounded to the nearest 0.1 m.
pub fn color_from_height(height: f32) -> [u8; 3] {
    let value = ((height as f64 - BASE_HEIGHT) / HEIGHT_STEP).round();
    let value = value.clamp(0.0, 0xFF_FFFF as f64) as u32;
    [(value >> 16) as u8, (value >> 8) as u8, value as u8]
}

/// Encode a height function as a terrain-RGB PNG.
///
/// `height_at(col, row)` is evaluated for every pixel. Used by fixtures and
/// the CLI's sample data generator.
pub fn encode_terrain_rgb_png<F>(
    resolution: u32,
    mut height_at: F,
) -> Result<Vec<u8>, image::ImageError>
where
    F: FnMut(u32, u32) -> f32,
{
    let image = ImageBuffer::from_fn(resolution, resolution, |col, row| {
        let [r, g, b] = color_from_height(height_at(col, row));
        Rgba([r, g, b, 255])
    });

    let mut buffer = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
