//! Events sent from decode workers to the owning thread.

use crate::bitmap::Bitmap;
use crate::provider::DecodeError;
use crate::tile::SharedTile;
use std::fmt;

/// Identifier of one decode batch (one render cycle).
///
/// Ids increase monotonically per executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub(crate) u64);

impl BatchId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happened in a batch.
#[derive(Debug)]
pub enum RenderEventKind {
    /// The batch was queued.
    PreExecute,
    /// A tile decoded successfully; the bitmap awaits installation.
    TileDecoded { tile: SharedTile, bitmap: Bitmap },
    /// A tile failed to decode. Only this tile is affected.
    TileFailed { tile: SharedTile, error: DecodeError },
    /// A tile was dropped without a result because the batch was cancelled.
    TileAbandoned { tile: SharedTile },
    /// A batch-level failure; the batch is being aborted.
    Exception { error: DecodeError },
    /// The batch finished after being cancelled or aborted.
    Cancelled,
    /// Every tile of the batch finished.
    PostExecute,
}

impl RenderEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            RenderEventKind::PreExecute => "pre_execute",
            RenderEventKind::TileDecoded { .. } => "tile_decoded",
            RenderEventKind::TileFailed { .. } => "tile_failed",
            RenderEventKind::TileAbandoned { .. } => "tile_abandoned",
            RenderEventKind::Exception { .. } => "exception",
            RenderEventKind::Cancelled => "cancelled",
            RenderEventKind::PostExecute => "post_execute",
        }
    }
}

/// An event tagged with the batch that produced it.
#[derive(Debug)]
pub struct RenderEvent {
    pub batch: BatchId,
    pub kind: RenderEventKind,
}

impl RenderEvent {
    pub fn new(batch: BatchId, kind: RenderEventKind) -> Self {
        Self { batch, kind }
    }
}
