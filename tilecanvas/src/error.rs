//! Crate-level error type.

use crate::config::ConfigFileError;
use crate::executor::ExecutorError;
use crate::surface::SurfaceError;
use thiserror::Error;

/// Errors surfaced by canvas setup and output.
///
/// Per-tile decode errors never reach this type; they are reported through
/// [`TileRenderListener`](crate::canvas::TileRenderListener).
#[derive(Debug, Error)]
pub enum TileCanvasError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Config(#[from] ConfigFileError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}
