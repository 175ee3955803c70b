//! Terratile CLI - Command-line interface
//!
//! Builds terrain meshes for blocks of tiles read from a local tile
//! directory, generates synthetic tile directories, and inspects the
//! configuration.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use terratile::config::{config_file_path, ConfigFile};
use terratile::logging::{init_logging, LoggingGuard};

use commands::config::ConfigCommands;
use commands::generate::GenerateArgs;
use commands::mesh::MeshArgs;
use commands::neighbors::NeighborsArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "terratile")]
#[command(version)]
#[command(about = "Terrain meshes from map tiles", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.terratile/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a block of tiles and build their terrain meshes
    Mesh(MeshArgs),

    /// Write a synthetic tile directory usable with `mesh`
    Generate(GenerateArgs),

    /// Print the eight neighbours of a tile
    Neighbors(NeighborsArgs),

    /// Inspect the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Mesh(args) => {
            let config = ConfigFile::load_from(&config_path)?;
            let _guard = start_logging(&config, cli.verbose)?;
            commands::mesh::run(args, config.terrain)
        }
        Commands::Generate(args) => {
            let config = ConfigFile::load_from(&config_path)?;
            let _guard = start_logging(&config, cli.verbose)?;
            commands::generate::run(args, &config.terrain)
        }
        Commands::Neighbors(args) => commands::neighbors::run(args),
        Commands::Config(command) => commands::config::run(command, &config_path),
    }
}

fn start_logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    let filter = if verbose {
        "terratile=debug"
    } else {
        "terratile=info"
    };
    init_logging(&config.logging.directory, &config.logging.file, filter)
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}
