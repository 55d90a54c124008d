//! Batch and per-tile decode tasks.
//!
//! A batch runs as one driver task that spawns a decode task per tile into a
//! `JoinSet`. Each decode task waits for a permit, runs the provider inside
//! `spawn_blocking`, and reports the outcome as a [`RenderEvent`]. The driver
//! reports `PostExecute` once every tile finished, or `Cancelled` if the
//! batch token fired along the way.

use super::event::{BatchId, RenderEvent, RenderEventKind};
use crate::provider::{BitmapProvider, DecodeContext, DecodeError};
use crate::tile::SharedTile;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Everything a batch needs, shared by its tile tasks.
#[derive(Clone)]
pub(crate) struct BatchContext {
    pub batch: BatchId,
    pub provider: Arc<dyn BitmapProvider>,
    pub decode: Arc<DecodeContext>,
    pub permits: Arc<Semaphore>,
    pub events: mpsc::UnboundedSender<RenderEvent>,
    pub token: CancellationToken,
}

impl BatchContext {
    fn send(&self, kind: RenderEventKind) {
        // The receiver disappears only when the canvas is gone
        let _ = self.events.send(RenderEvent::new(self.batch, kind));
    }
}

/// How a single tile task ended.
#[derive(Debug)]
pub(crate) enum TileOutcome {
    Decoded,
    Failed,
    Abandoned,
    ResourceExhausted(DecodeError),
}

/// Drive one batch to completion.
pub(crate) async fn run_batch(ctx: BatchContext, tiles: Vec<SharedTile>) {
    let total = tiles.len();
    let mut tasks = JoinSet::new();
    for tile in tiles {
        tasks.spawn(decode_tile(ctx.clone(), tile));
    }

    let mut decoded = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(TileOutcome::Decoded) => decoded += 1,
            Ok(TileOutcome::Failed) => failed += 1,
            Ok(TileOutcome::Abandoned) => {}
            Ok(TileOutcome::ResourceExhausted(error)) => {
                if !ctx.token.is_cancelled() {
                    warn!(batch = %ctx.batch, error = %error, "Resource exhaustion, aborting batch");
                    ctx.token.cancel();
                    ctx.send(RenderEventKind::Exception { error });
                }
            }
            Err(e) => warn!(batch = %ctx.batch, error = %e, "Decode task failed to join"),
        }
    }

    if ctx.token.is_cancelled() {
        debug!(batch = %ctx.batch, total, decoded, failed, "Batch cancelled");
        ctx.send(RenderEventKind::Cancelled);
    } else {
        debug!(batch = %ctx.batch, total, decoded, failed, "Batch complete");
        ctx.send(RenderEventKind::PostExecute);
    }
}

/// Decode one tile and report the outcome.
async fn decode_tile(ctx: BatchContext, tile: SharedTile) -> TileOutcome {
    let permit = tokio::select! {
        biased;
        _ = ctx.token.cancelled() => None,
        permit = Arc::clone(&ctx.permits).acquire_owned() => permit.ok(),
    };
    let Some(permit) = permit else {
        ctx.send(RenderEventKind::TileAbandoned { tile });
        return TileOutcome::Abandoned;
    };
    if ctx.token.is_cancelled() {
        drop(permit);
        ctx.send(RenderEventKind::TileAbandoned { tile });
        return TileOutcome::Abandoned;
    }

    let provider = Arc::clone(&ctx.provider);
    let decode = Arc::clone(&ctx.decode);
    let worker_tile = Arc::clone(&tile);
    let joined = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        provider.decode(&worker_tile, &decode)
    })
    .await;

    let result = match joined {
        Ok(result) => result,
        Err(e) => Err(DecodeError::Panicked(e.to_string())),
    };

    match result {
        Ok(bitmap) if ctx.token.is_cancelled() => {
            ctx.decode.release(bitmap);
            ctx.send(RenderEventKind::TileAbandoned { tile });
            TileOutcome::Abandoned
        }
        Ok(bitmap) => {
            trace!(batch = %ctx.batch, tile = %tile.key(), "Tile decoded");
            ctx.send(RenderEventKind::TileDecoded { tile, bitmap });
            TileOutcome::Decoded
        }
        Err(error) if error.is_resource_exhaustion() => {
            ctx.send(RenderEventKind::TileAbandoned { tile });
            TileOutcome::ResourceExhausted(error)
        }
        Err(error) => {
            ctx.send(RenderEventKind::TileFailed { tile, error });
            TileOutcome::Failed
        }
    }
}
