//! `neighbors` command.

use clap::Args;
use terratile::coord::{Direction, TileId};

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct NeighborsArgs {
    /// Zoom level
    #[arg(long)]
    pub zoom: u8,

    /// Tile column (may lie outside 0..2^zoom)
    #[arg(long, allow_negative_numbers = true)]
    pub x: i32,

    /// Tile row
    #[arg(long)]
    pub y: i32,
}

pub fn run(args: NeighborsArgs) -> Result<(), CliError> {
    let id = TileId::new(args.zoom, args.x, args.y)?;

    println!("Tile {} (canonical {})", id, id.canonical());
    for direction in Direction::ALL {
        match id.neighbor(direction) {
            Some(neighbor) => println!("  {:<10} {}", direction.to_string(), neighbor),
            None => println!("  {:<10} -", direction.to_string()),
        }
    }

    Ok(())
}
