//! Tile identity type definitions

use std::fmt;

use thiserror::Error;

/// Deepest zoom level accepted for tile identities.
pub const MAX_ZOOM: u8 = 22;

/// Half the circumference of the Web Mercator world, in metres.
pub const ORIGIN_SHIFT: f64 = 20_037_508.342_789_244;

/// Unwrapped tile identity.
///
/// `x` is not reduced modulo the world width, so tiles east of the
/// antimeridian keep growing `x` and tiles west of it go negative. This is the
/// key used for mesh caching and stitching: two on-screen cells that show the
/// same canonical tile on different world copies stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    /// Zoom level
    pub z: u8,
    /// Column, 0 at the antimeridian on the primary world copy
    pub x: i32,
    /// Row, 0 at the north edge
    pub y: i32,
}

impl TileId {
    /// Create a validated tile identity.
    pub fn new(z: u8, x: i32, y: i32) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        let rows = tiles_per_axis(z);
        if y < 0 || y >= rows {
            return Err(CoordError::RowOutOfRange { z, y, rows });
        }
        Ok(Self { z, x, y })
    }

    /// Reduce to the canonical (wrapped) identity used for data requests.
    pub fn canonical(&self) -> CanonicalTileId {
        let n = tiles_per_axis(self.z);
        CanonicalTileId {
            z: self.z,
            x: self.x.rem_euclid(n) as u32,
            y: self.y as u32,
        }
    }

    /// Neighbour in the given direction.
    ///
    /// Returns `None` when the neighbour would fall off the north or south edge
    /// of the world, or past the range of `i32` columns. East/west never wrap
    /// in the unwrapped form.
    pub fn neighbor(&self, direction: Direction) -> Option<TileId> {
        let (dx, dy) = direction.offset();
        let y = self.y.checked_add(dy)?;
        if y < 0 || y >= tiles_per_axis(self.z) {
            return None;
        }
        Some(TileId {
            z: self.z,
            x: self.x.checked_add(dx)?,
            y,
        })
    }

    pub fn north(&self) -> Option<TileId> {
        self.neighbor(Direction::North)
    }

    pub fn south(&self) -> Option<TileId> {
        self.neighbor(Direction::South)
    }

    pub fn east(&self) -> Option<TileId> {
        self.neighbor(Direction::East)
    }

    pub fn west(&self) -> Option<TileId> {
        self.neighbor(Direction::West)
    }

    /// All present neighbours, in stitching order.
    pub fn neighbors(&self) -> impl Iterator<Item = (Direction, TileId)> + '_ {
        Direction::ALL
            .iter()
            .filter_map(move |dir| self.neighbor(*dir).map(|id| (*dir, id)))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Canonical tile identity, `x` wrapped into `0..2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalTileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for CanonicalTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl From<CanonicalTileId> for TileId {
    fn from(id: CanonicalTileId) -> Self {
        Self {
            z: id.z,
            x: id.x as i32,
            y: id.y as i32,
        }
    }
}

/// One of the eight directions around a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Direction {
    /// Every direction, edges before corners.
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
        Direction::NorthWest,
        Direction::NorthEast,
        Direction::SouthWest,
        Direction::SouthEast,
    ];

    /// Column/row offset of the neighbour in this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::NorthWest => (-1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::NorthEast => Direction::SouthWest,
            Direction::NorthWest => Direction::SouthEast,
            Direction::SouthEast => Direction::NorthWest,
            Direction::SouthWest => Direction::NorthEast,
        }
    }

    /// True for the four diagonal directions.
    pub fn is_corner(&self) -> bool {
        let (dx, dy) = self.offset();
        dx != 0 && dy != 0
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
            Direction::NorthEast => "NE",
            Direction::NorthWest => "NW",
            Direction::SouthEast => "SE",
            Direction::SouthWest => "SW",
        };
        f.write_str(name)
    }
}

/// A point in Web Mercator metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorPoint {
    pub x: f64,
    pub y: f64,
}

/// Tile footprint in Web Mercator metres.
///
/// `min` is the north-west corner and `max` the south-east corner, so
/// `min.y > max.y`. Interpolating from `min` to `max` walks the tile in
/// row-major order starting at the north-west.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min: MercatorPoint,
    pub max: MercatorPoint,
}

impl TileBounds {
    pub fn center(&self) -> MercatorPoint {
        MercatorPoint {
            x: (self.min.x + self.max.x) / 2.0,
            y: (self.min.y + self.max.y) / 2.0,
        }
    }

    /// Edge length in metres.
    pub fn size(&self) -> f64 {
        (self.max.x - self.min.x).abs()
    }
}

/// Errors that can occur when building tile identities.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid zoom level: {0} (max {max})", max = MAX_ZOOM)]
    InvalidZoom(u8),

    #[error("Row {y} out of range at zoom {z} (0..{rows})")]
    RowOutOfRange { z: u8, y: i32, rows: i32 },
}

/// Number of tiles along one axis at the given zoom.
///
/// Zoom levels past [`MAX_ZOOM`] count as `MAX_ZOOM`.
#[inline]
pub fn tiles_per_axis(z: u8) -> i32 {
    1_i32 << z.min(MAX_ZOOM)
}
