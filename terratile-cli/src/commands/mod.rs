//! CLI command implementations.

pub mod config;
pub mod generate;
pub mod mesh;
pub mod neighbors;

use terratile::coord::TileId;

use crate::error::CliError;

/// Widest block the `mesh` and `generate` commands accept, in tiles on each
/// side of the centre.
pub const MAX_RADIUS: u32 = 32;

/// Tiles of the square block centred on `center`, row-major from the
/// north-west corner.
///
/// Rows past the poles are skipped; columns wrap around the antimeridian.
///
/// # Errors
///
/// Returns `CliError::InvalidRadius` above [`MAX_RADIUS`] and
/// `CliError::ColumnOutOfRange` when a column does not fit an `i32`.
pub fn block_around(center: TileId, radius: u32) -> Result<Vec<TileId>, CliError> {
    if radius > MAX_RADIUS {
        return Err(CliError::InvalidRadius {
            radius,
            max: MAX_RADIUS,
        });
    }
    let r = radius as i32;
    let side = (2 * radius + 1) as usize;
    let mut tiles = Vec::with_capacity(side * side);
    for dy in -r..=r {
        for dx in -r..=r {
            let x = center
                .x
                .checked_add(dx)
                .ok_or(CliError::ColumnOutOfRange(center.x))?;
            let Some(y) = center.y.checked_add(dy) else {
                continue;
            };
            match TileId::new(center.z, x, y) {
                Ok(id) => tiles.push(id),
                Err(_) if dy != 0 => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_row_major_from_north_west() {
        let center = TileId::new(4, 5, 5).unwrap();
        let block = block_around(center, 1).unwrap();

        assert_eq!(block.len(), 9);
        assert_eq!(block[0], TileId::new(4, 4, 4).unwrap());
        assert_eq!(block[1], TileId::new(4, 5, 4).unwrap());
        assert_eq!(block[4], center);
        assert_eq!(block[8], TileId::new(4, 6, 6).unwrap());
    }

    #[test]
    fn test_block_skips_rows_past_the_pole() {
        let center = TileId::new(2, 1, 0).unwrap();
        let block = block_around(center, 1).unwrap();

        assert_eq!(block.len(), 6);
        assert!(block.iter().all(|id| id.y >= 0));
    }

    #[test]
    fn test_oversized_radius_is_an_error() {
        let center = TileId::new(22, 5, 5).unwrap();

        let result = block_around(center, 40_000);
        assert!(matches!(
            result,
            Err(CliError::InvalidRadius { radius: 40_000, max: MAX_RADIUS })
        ));
        assert!(block_around(center, u32::MAX).is_err());
        assert_eq!(block_around(center, MAX_RADIUS).unwrap().len(), 65 * 65);
    }

    #[test]
    fn test_column_overflow_is_an_error() {
        let center = TileId::new(4, i32::MAX, 5).unwrap();
        assert!(matches!(
            block_around(center, 1),
            Err(CliError::ColumnOutOfRange(i32::MAX))
        ));
    }

    #[test]
    fn test_zero_radius_is_single_tile() {
        let center = TileId::new(3, 2, 2).unwrap();
        assert_eq!(block_around(center, 0).unwrap(), vec![center]);
    }
}
