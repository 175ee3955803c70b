//! CLI error handling with user-friendly messages.

use std::fmt;
use std::path::PathBuf;
use std::process;

use terratile::config::ConfigFileError;
use terratile::coord::CoordError;
use terratile::fetch::FetchError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration could not be loaded or is invalid
    Config(ConfigFileError),
    /// Tile coordinates out of range
    InvalidTile(CoordError),
    /// Block radius too large
    InvalidRadius { radius: u32, max: u32 },
    /// A block column does not fit the tile column range
    ColumnOutOfRange(i32),
    /// A fetch could not be issued
    Fetch(FetchError),
    /// Failed to encode an image
    Image(image::ImageError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Failed to write output file
    FileWrite { path: PathBuf, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(ConfigFileError::InvalidValue { .. }) = self {
            eprintln!();
            eprintln!("Run 'terratile config show' to see the effective configuration.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidTile(e) => write!(f, "Invalid tile: {}", e),
            CliError::InvalidRadius { radius, max } => {
                write!(f, "Invalid radius {}: must be at most {}", radius, max)
            }
            CliError::ColumnOutOfRange(x) => {
                write!(f, "Block around column {} runs past the column range", x)
            }
            CliError::Fetch(e) => write!(f, "Failed to start loading: {}", e),
            CliError::Image(e) => write!(f, "Failed to encode image: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::InvalidTile(e) => Some(e),
            CliError::Fetch(e) => Some(e),
            CliError::Image(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            CliError::LoggingInit(_)
            | CliError::InvalidRadius { .. }
            | CliError::ColumnOutOfRange(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::InvalidTile(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}

impl From<image::ImageError> for CliError {
    fn from(e: image::ImageError) -> Self {
        CliError::Image(e)
    }
}
