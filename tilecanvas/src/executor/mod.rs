//! Cancellable decode pool for render batches.
//!
//! The [`RenderPoolExecutor`] owns a dedicated Tokio runtime. Each call to
//! [`RenderPoolExecutor::queue`] starts a batch: tiles that still need a
//! bitmap are marked pending and decoded concurrently, at most
//! `decode_threads` at a time. Results never touch tile sets directly; they
//! are sent as [`RenderEvent`]s to the receiver returned by
//! [`RenderPoolExecutor::new`], which the owning thread drains.
//!
//! # Architecture
//!
//! ```text
//! owning thread                     executor runtime
//! ─────────────                     ────────────────
//! queue(tiles) ──PreExecute──┐
//!      │                     │      run_batch
//!      └─── spawn ───────────┼────►   ├─ decode_tile ─► spawn_blocking(provider.decode)
//!                            │        ├─ decode_tile ─► ...
//!                            │        └─ PostExecute | Cancelled
//! events.recv() ◄────────────┴────── TileDecoded / TileFailed / TileAbandoned
//! ```
//!
//! # Cancellation
//!
//! Every batch gets a child of the executor's shutdown token. Queuing a new
//! batch cancels the previous one. Cancellation never waits for workers;
//! in-flight decodes finish, notice the token and report the tile as
//! abandoned instead of decoded.

mod event;
mod task;

pub use event::{BatchId, RenderEvent, RenderEventKind};

use crate::bitmap::BitmapPool;
use crate::provider::{BitmapProvider, DecodeContext};
use crate::tile::SharedTile;
use std::future::Future;
use std::sync::Arc;
use task::BatchContext;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Default number of runtime worker threads driving batch tasks.
pub const DEFAULT_RUNTIME_THREADS: usize = 2;

/// Minimum number of concurrent decodes.
pub const MIN_DECODE_THREADS: usize = 2;

/// Default number of concurrent decodes: available parallelism, at least
/// [`MIN_DECODE_THREADS`].
pub fn default_decode_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_DECODE_THREADS)
        .max(MIN_DECODE_THREADS)
}

/// Configuration for the render pool executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum concurrent decodes.
    pub decode_threads: usize,
    /// Runtime worker threads for task bookkeeping.
    pub runtime_threads: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            decode_threads: default_decode_threads(),
            runtime_threads: DEFAULT_RUNTIME_THREADS,
        }
    }
}

impl ExecutorConfig {
    pub fn with_decode_threads(mut self, threads: usize) -> Self {
        self.decode_threads = threads.max(1);
        self
    }

    pub fn with_runtime_threads(mut self, threads: usize) -> Self {
        self.runtime_threads = threads.max(1);
        self
    }
}

/// Errors from the executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to create decode runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

// =============================================================================
// Executor
// =============================================================================

struct ActiveBatch {
    id: BatchId,
    token: CancellationToken,
}

/// Decode pool with batch supersession and non-blocking cancellation.
pub struct RenderPoolExecutor {
    config: ExecutorConfig,
    runtime: Option<Runtime>,
    provider: Arc<dyn BitmapProvider>,
    decode: Arc<DecodeContext>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    events: mpsc::UnboundedSender<RenderEvent>,
    current: Option<ActiveBatch>,
    next_batch: u64,
}

impl RenderPoolExecutor {
    /// Create the executor and the receiver its events arrive on.
    pub fn new(
        config: ExecutorConfig,
        provider: Arc<dyn BitmapProvider>,
        pool: Arc<BitmapPool>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RenderEvent>), ExecutorError> {
        let decode_threads = config.decode_threads.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.runtime_threads.max(1))
            .max_blocking_threads(decode_threads)
            .thread_name("tile-render")
            .enable_all()
            .build()?;

        info!(
            decode_threads,
            runtime_threads = config.runtime_threads,
            "Render pool started"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let executor = Self {
            config,
            runtime: Some(runtime),
            provider,
            decode: Arc::new(DecodeContext::new(pool)),
            permits: Arc::new(Semaphore::new(decode_threads)),
            shutdown: CancellationToken::new(),
            events: tx,
            current: None,
            next_batch: 1,
        };
        Ok((executor, rx))
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Replace the provider used by batches queued from now on.
    pub fn set_provider(&mut self, provider: Arc<dyn BitmapProvider>) {
        self.provider = provider;
    }

    pub fn provider(&self) -> &Arc<dyn BitmapProvider> {
        &self.provider
    }

    /// Context handed to providers; shared with running batches.
    pub fn decode_context(&self) -> &DecodeContext {
        &self.decode
    }

    /// Start a batch for `tiles`, superseding any running batch.
    ///
    /// Tiles already decoded or destroyed are skipped. Returns `None` after
    /// [`shutdown_now`](Self::shutdown_now).
    pub fn queue(&mut self, tiles: Vec<SharedTile>) -> Option<BatchId> {
        let Some(runtime) = self.runtime.as_ref() else {
            warn!("Render pool is shut down, dropping decode batch");
            return None;
        };

        if let Some(previous) = self.current.take() {
            if !previous.token.is_cancelled() {
                debug!(batch = %previous.id, "Superseding running batch");
                previous.token.cancel();
            }
        }

        let id = BatchId(self.next_batch);
        self.next_batch += 1;
        let token = self.shutdown.child_token();

        let _ = self
            .events
            .send(RenderEvent::new(id, RenderEventKind::PreExecute));

        let requested = tiles.len();
        let work: Vec<SharedTile> = tiles
            .into_iter()
            .filter(|tile| tile.mark_pending(id))
            .collect();
        debug!(batch = %id, requested, decoding = work.len(), "Queued decode batch");

        let ctx = BatchContext {
            batch: id,
            provider: Arc::clone(&self.provider),
            decode: Arc::clone(&self.decode),
            permits: Arc::clone(&self.permits),
            events: self.events.clone(),
            token: token.clone(),
        };
        runtime.spawn(task::run_batch(ctx, work));

        self.current = Some(ActiveBatch { id, token });
        Some(id)
    }

    /// Cancel the running batch without waiting for it.
    pub fn cancel(&mut self) {
        if let Some(batch) = &self.current {
            if !batch.token.is_cancelled() {
                debug!(batch = %batch.id, "Cancelling batch");
                batch.token.cancel();
            }
        }
    }

    /// Id of the most recently queued batch.
    pub fn current_batch(&self) -> Option<BatchId> {
        self.current.as_ref().map(|batch| batch.id)
    }

    /// True if `batch` is the most recent batch and has not been cancelled.
    pub fn is_batch_live(&self, batch: BatchId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| current.id == batch && !current.token.is_cancelled())
    }

    pub fn is_shutdown(&self) -> bool {
        self.runtime.is_none()
    }

    /// Cancel everything and stop the runtime without waiting for decodes.
    pub fn shutdown_now(&mut self) {
        self.shutdown.cancel();
        self.permits.close();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            info!("Render pool shut down");
        }
    }

    /// Run `future` on the executor runtime from the owning thread.
    ///
    /// Returns `None` after shutdown. Must not be called from inside an
    /// async context.
    pub fn block_on<F: Future>(&self, future: F) -> Option<F::Output> {
        self.runtime.as_ref().map(|runtime| runtime.block_on(future))
    }
}

impl Drop for RenderPoolExecutor {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::provider::{DecodeError, PatternBitmapProvider};
    use crate::tile::{Tile, TileState};
    use parking_lot::{Condvar, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Blocks every decode until released.
    struct GatedProvider {
        open: Mutex<bool>,
        signal: Condvar,
        entered: AtomicUsize,
    }

    impl GatedProvider {
        fn new() -> Self {
            Self {
                open: Mutex::new(false),
                signal: Condvar::new(),
                entered: AtomicUsize::new(0),
            }
        }

        fn release(&self) {
            *self.open.lock() = true;
            self.signal.notify_all();
        }

        fn wait_entered(&self, count: usize) {
            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            while self.entered.load(Ordering::SeqCst) < count {
                assert!(std::time::Instant::now() < deadline, "decodes never started");
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    impl BitmapProvider for GatedProvider {
        fn decode(&self, tile: &Tile, context: &DecodeContext) -> Result<Bitmap, DecodeError> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let mut open = self.open.lock();
            while !*open {
                self.signal.wait(&mut open);
            }
            drop(open);
            context.allocate(tile.width(), tile.height())
        }
    }

    struct ExhaustedProvider;

    impl BitmapProvider for ExhaustedProvider {
        fn decode(&self, _tile: &Tile, _context: &DecodeContext) -> Result<Bitmap, DecodeError> {
            Err(DecodeError::ResourceExhausted { bytes: 1 << 30 })
        }
    }

    fn tiles(n: u32) -> Vec<SharedTile> {
        (0..n).map(|i| Arc::new(Tile::new(i, 0, 8, 8, 1.0))).collect()
    }

    fn executor(
        provider: Arc<dyn BitmapProvider>,
    ) -> (RenderPoolExecutor, mpsc::UnboundedReceiver<RenderEvent>) {
        RenderPoolExecutor::new(
            ExecutorConfig::default().with_decode_threads(2),
            provider,
            Arc::new(BitmapPool::default()),
        )
        .unwrap()
    }

    /// Collect events of `batch` until it ends.
    fn collect_batch(
        executor: &RenderPoolExecutor,
        rx: &mut mpsc::UnboundedReceiver<RenderEvent>,
        batch: BatchId,
    ) -> Vec<RenderEventKind> {
        let mut kinds = Vec::new();
        loop {
            let event = executor
                .block_on(async {
                    tokio::time::timeout(Duration::from_secs(5), rx.recv()).await
                })
                .unwrap()
                .expect("timed out waiting for batch")
                .expect("channel closed");
            if event.batch != batch {
                continue;
            }
            let done = matches!(
                event.kind,
                RenderEventKind::PostExecute | RenderEventKind::Cancelled
            );
            kinds.push(event.kind);
            if done {
                return kinds;
            }
        }
    }

    #[test]
    fn test_batch_decodes_every_tile() {
        let (mut executor, mut rx) = executor(Arc::new(PatternBitmapProvider::new()));
        let batch = executor.queue(tiles(4)).unwrap();

        let kinds = collect_batch(&executor, &mut rx, batch);
        assert!(matches!(kinds[0], RenderEventKind::PreExecute));
        assert!(matches!(kinds.last(), Some(RenderEventKind::PostExecute)));
        let decoded = kinds
            .iter()
            .filter(|k| matches!(k, RenderEventKind::TileDecoded { .. }))
            .count();
        assert_eq!(decoded, 4);
    }

    #[test]
    fn test_queue_marks_tiles_pending_and_skips_decoded() {
        let (mut executor, mut rx) = executor(Arc::new(PatternBitmapProvider::new()));
        let batch_tiles = tiles(2);
        let done = Arc::new(Tile::new(9, 9, 8, 8, 1.0));
        done.mark_pending(BatchId(0));
        done.install_bitmap(BatchId(0), Bitmap::new(8, 8).unwrap())
            .unwrap();

        let mut queued = batch_tiles.clone();
        queued.push(Arc::clone(&done));
        let batch = executor.queue(queued).unwrap();
        assert_eq!(batch_tiles[0].state(), TileState::PendingDecode);

        let kinds = collect_batch(&executor, &mut rx, batch);
        let decoded = kinds
            .iter()
            .filter(|k| matches!(k, RenderEventKind::TileDecoded { .. }))
            .count();
        assert_eq!(decoded, 2);
    }

    #[test]
    fn test_empty_batch_completes() {
        let (mut executor, mut rx) = executor(Arc::new(PatternBitmapProvider::new()));
        let batch = executor.queue(Vec::new()).unwrap();

        let kinds = collect_batch(&executor, &mut rx, batch);
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[1], RenderEventKind::PostExecute));
    }

    #[test]
    fn test_cancel_abandons_in_flight_tiles() {
        let provider = Arc::new(GatedProvider::new());
        let (mut executor, mut rx) = executor(provider.clone());
        let batch = executor.queue(tiles(3)).unwrap();
        assert!(executor.is_batch_live(batch));

        executor.cancel();
        assert!(!executor.is_batch_live(batch));
        provider.release();

        let kinds = collect_batch(&executor, &mut rx, batch);
        assert!(matches!(kinds.last(), Some(RenderEventKind::Cancelled)));
        assert!(!kinds
            .iter()
            .any(|k| matches!(k, RenderEventKind::TileDecoded { .. })));
    }

    #[test]
    fn test_cancelled_results_respect_recycle_flag() {
        for recycle in [false, true] {
            let provider = Arc::new(GatedProvider::new());
            let (mut executor, mut rx) = executor(provider.clone());
            executor.decode_context().set_recycle_bitmaps(recycle);
            let batch = executor.queue(tiles(2)).unwrap();

            provider.wait_entered(2);
            executor.cancel();
            provider.release();
            collect_batch(&executor, &mut rx, batch);

            let recycled = executor.decode_context().pool().stats().recycled;
            assert_eq!(recycled, if recycle { 2 } else { 0 });
        }
    }

    #[test]
    fn test_new_batch_supersedes_previous() {
        let provider = Arc::new(GatedProvider::new());
        let (mut executor, mut rx) = executor(provider.clone());
        let first = executor.queue(tiles(2)).unwrap();
        let second = executor.queue(vec![Arc::new(Tile::new(7, 7, 8, 8, 1.0))]).unwrap();

        assert!(second > first);
        assert!(!executor.is_batch_live(first));
        assert!(executor.is_batch_live(second));

        provider.release();
        let kinds = collect_batch(&executor, &mut rx, second);
        assert!(matches!(kinds.last(), Some(RenderEventKind::PostExecute)));
    }

    #[test]
    fn test_resource_exhaustion_aborts_batch() {
        let (mut executor, mut rx) = executor(Arc::new(ExhaustedProvider));
        let batch = executor.queue(tiles(3)).unwrap();

        let kinds = collect_batch(&executor, &mut rx, batch);
        let exceptions = kinds
            .iter()
            .filter(|k| matches!(k, RenderEventKind::Exception { .. }))
            .count();
        assert_eq!(exceptions, 1);
        assert!(matches!(kinds.last(), Some(RenderEventKind::Cancelled)));
    }

    #[test]
    fn test_queue_after_shutdown_is_rejected() {
        let (mut executor, _rx) = executor(Arc::new(PatternBitmapProvider::new()));
        executor.shutdown_now();
        assert!(executor.is_shutdown());
        assert!(executor.queue(tiles(1)).is_none());
        assert!(executor.block_on(async { 1 }).is_none());
    }
}
