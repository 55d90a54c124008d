//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;
use tilecanvas::config::ConfigFileError;
use tilecanvas::surface::SurfaceError;
use tilecanvas::TileCanvasError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid command-line arguments
    InvalidArgument(String),
    /// Failed to create the canvas
    CanvasCreation(TileCanvasError),
    /// Rendering did not settle in time
    RenderTimeout { step: usize, timeout_secs: u64 },
    /// Failed to write output image
    Output { path: PathBuf, error: SurfaceError },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'tilecanvas config init' to write a default configuration file.");
            }
            CliError::RenderTimeout { .. } => {
                eprintln!();
                eprintln!("Try a larger --timeout, fewer tiles, or more decode threads.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::CanvasCreation(e) => write!(f, "Failed to create canvas: {}", e),
            CliError::RenderTimeout { step, timeout_secs } => write!(
                f,
                "Render step {} did not finish within {}s",
                step, timeout_secs
            ),
            CliError::Output { path, error } => {
                write!(f, "Failed to write '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::CanvasCreation(e) => Some(e),
            CliError::Output { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<TileCanvasError> for CliError {
    fn from(e: TileCanvasError) -> Self {
        CliError::CanvasCreation(e)
    }
}
