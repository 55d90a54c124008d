//! The tile canvas: viewport-driven tile scheduling and compositing.
//!
//! [`TileCanvas`] decides which tiles to decode, hands them to the
//! [`RenderPoolExecutor`], admits finished bitmaps and draws them onto a
//! [`Surface`]. It is driven entirely from one owning thread: worker results
//! arrive as events and are applied on [`TileCanvas::tick`].
//!
//! # Render cycle
//!
//! ```text
//! request_render ──(render buffer)──► render_tiles
//!                                        │ phase must be Active
//!                                        ▼
//!                       level.compute_current_state()
//!                                        │ unchanged and level already rendered? ─► skip
//!                                        ▼
//!                       diff viewport ─► destroy evicted tiles
//!                                        ▼
//!                       queue in-viewport − already-rendered
//!                                        ▼
//!        TileDecoded events ─► validate ─► ready-to-draw ─► draw_tiles ─► already-rendered
//!                                        ▼
//!        PostExecute ─► listener.on_render_complete ─► request_render (loop until skip)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tilecanvas::canvas::TileCanvas;
//! use tilecanvas::config::CanvasConfig;
//! use tilecanvas::detail::GridDetailLevel;
//! use tilecanvas::geom::PixelRect;
//! use tilecanvas::provider::PatternBitmapProvider;
//! use tilecanvas::surface::PixmapSurface;
//!
//! let config = CanvasConfig::default()
//!     .with_render_buffer(Duration::ZERO)
//!     .with_transitions_enabled(false);
//! let mut canvas = TileCanvas::new(config, Arc::new(PatternBitmapProvider::new())).unwrap();
//!
//! let level = Arc::new(GridDetailLevel::new(1.0, 64, 64, 256, 256));
//! level.set_viewport(PixelRect::new(0, 0, 128, 128));
//! canvas.set_detail_level(level);
//!
//! assert!(canvas.run_until_idle(Duration::from_secs(5)));
//! let mut surface = PixmapSurface::new(256, 256).unwrap();
//! canvas.draw_tiles(&mut surface);
//! assert_eq!(canvas.tile_sets().already_rendered().len(), 4);
//! ```

mod listener;
mod phase;
mod sets;
mod throttle;

pub use listener::TileRenderListener;
pub use phase::RenderCyclePhase;
pub use sets::{Admission, TileSets};
pub use throttle::{RenderThrottle, DEFAULT_RENDER_BUFFER, FAST_RENDER_BUFFER};

use crate::bitmap::{Bitmap, BitmapPool};
use crate::config::CanvasConfig;
use crate::detail::{DetailLevel, LevelId};
use crate::executor::{
    BatchId, ExecutorError, RenderEvent, RenderEventKind, RenderPoolExecutor,
};
use crate::provider::{BitmapProvider, DecodeError};
use crate::surface::{ScaledSurface, Surface};
use crate::tile::SharedTile;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Coordinates tile sets, decode batches and compositing for one view.
pub struct TileCanvas {
    config: CanvasConfig,
    scale: f32,

    detail_level_to_render: Option<Arc<dyn DetailLevel>>,
    last_requested_level: Option<LevelId>,
    last_rendered_level: Option<LevelId>,

    phase: RenderCyclePhase,
    is_rendering: bool,
    /// Most recently queued batch.
    in_flight: Option<BatchId>,
    /// Batches reported to the listener as started and not yet finished.
    started: HashSet<BatchId>,
    needs_redraw: bool,
    destroyed: bool,

    throttle: RenderThrottle,
    sets: TileSets,
    listener: Option<Box<dyn TileRenderListener + Send>>,

    pool: Arc<BitmapPool>,
    executor: RenderPoolExecutor,
    events: mpsc::UnboundedReceiver<RenderEvent>,
}

impl TileCanvas {
    /// Create a canvas decoding with `provider`.
    pub fn new(
        config: CanvasConfig,
        provider: Arc<dyn BitmapProvider>,
    ) -> Result<Self, ExecutorError> {
        let pool = Arc::new(BitmapPool::new(config.bitmap_pool_bytes));
        let (executor, events) =
            RenderPoolExecutor::new(config.executor.clone(), provider, Arc::clone(&pool))?;
        executor
            .decode_context()
            .set_recycle_bitmaps(config.should_recycle_bitmaps);

        Ok(Self {
            config,
            scale: 1.0,
            detail_level_to_render: None,
            last_requested_level: None,
            last_rendered_level: None,
            phase: RenderCyclePhase::Active,
            is_rendering: false,
            in_flight: None,
            started: HashSet::new(),
            needs_redraw: false,
            destroyed: false,
            throttle: RenderThrottle::new(),
            sets: TileSets::new(),
            listener: None,
            pool,
            executor,
            events,
        })
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Display scale applied when compositing.
    pub fn set_scale(&mut self, factor: f32) {
        self.scale = factor;
        self.needs_redraw = true;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Whether newly admitted tiles fade in.
    pub fn set_transitions_enabled(&mut self, enabled: bool) {
        self.config.transitions_enabled = enabled;
    }

    pub fn transitions_enabled(&self) -> bool {
        self.config.transitions_enabled
    }

    pub fn set_transition_duration(&mut self, duration: Duration) {
        self.config.transition_duration = duration;
    }

    pub fn transition_duration(&self) -> Duration {
        self.config.transition_duration
    }

    /// Delay between a render request and the render cycle.
    pub fn set_render_buffer(&mut self, buffer: Duration) {
        self.config.render_buffer = buffer;
    }

    pub fn render_buffer(&self) -> Duration {
        self.config.render_buffer
    }

    /// Whether bitmaps of destroyed tiles go back to the pool.
    pub fn set_should_recycle_bitmaps(&mut self, recycle: bool) {
        self.config.should_recycle_bitmaps = recycle;
        self.executor.decode_context().set_recycle_bitmaps(recycle);
    }

    pub fn should_recycle_bitmaps(&self) -> bool {
        self.config.should_recycle_bitmaps
    }

    /// Provider for batches queued from now on.
    pub fn set_bitmap_provider(&mut self, provider: Arc<dyn BitmapProvider>) {
        self.executor.set_provider(provider);
    }

    pub fn set_tile_render_listener(&mut self, listener: Option<Box<dyn TileRenderListener + Send>>) {
        self.listener = listener;
    }

    // =========================================================================
    // State
    // =========================================================================

    pub fn detail_level(&self) -> Option<&Arc<dyn DetailLevel>> {
        self.detail_level_to_render.as_ref()
    }

    /// Level of the last render cycle that completed.
    pub fn last_rendered_level(&self) -> Option<LevelId> {
        self.last_rendered_level
    }

    pub fn phase(&self) -> RenderCyclePhase {
        self.phase
    }

    /// True between a batch's start and its completion or cancellation.
    pub fn is_rendering(&self) -> bool {
        self.is_rendering
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// True when no batch is running or owes the listener its outcome, and
    /// no render is scheduled.
    pub fn is_idle(&self) -> bool {
        self.destroyed
            || (self.in_flight.is_none()
                && self.started.is_empty()
                && !self.throttle.is_pending())
    }

    pub fn tile_sets(&self) -> &TileSets {
        &self.sets
    }

    pub fn bitmap_pool(&self) -> &Arc<BitmapPool> {
        &self.pool
    }

    /// Whether the host should redraw. Clears the request.
    pub fn take_invalidation(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    // =========================================================================
    // Render control
    // =========================================================================

    /// Make `level` the level to render.
    ///
    /// Does nothing if it equals the last requested level; otherwise cancels
    /// the running batch and requests a render.
    pub fn set_detail_level(&mut self, level: Arc<dyn DetailLevel>) {
        let id = level.level_id();
        if self.last_requested_level == Some(id) {
            return;
        }
        debug!(level = %id, "Detail level changed");
        self.detail_level_to_render = Some(level);
        self.last_requested_level = Some(id);
        self.cancel_render();
        self.request_render();
    }

    /// Schedule a render cycle after the render buffer.
    ///
    /// Lifts any cancellation or suppression. Requests made while one is
    /// pending coalesce.
    pub fn request_render(&mut self) {
        self.phase = RenderCyclePhase::Active;
        if self.destroyed || self.detail_level_to_render.is_none() {
            return;
        }
        if self
            .throttle
            .request(Instant::now(), self.config.render_buffer)
        {
            trace!(buffer_ms = self.config.render_buffer.as_millis() as u64, "Render scheduled");
        }
    }

    /// Cancel the running batch and block cycles until the next request.
    pub fn cancel_render(&mut self) {
        self.phase = RenderCyclePhase::Cancelled;
        self.executor.cancel();
    }

    /// Hold back render cycles until the next request. Running work
    /// continues.
    pub fn suppress_render(&mut self) {
        self.phase = self.phase.suppressed();
    }

    /// Stop rendering and drop every tile.
    ///
    /// The next render cycle rebuilds the viewport from scratch.
    pub fn clear(&mut self) {
        self.suppress_render();
        self.cancel_render();

        let tiles = self.sets.drain_all();
        debug!(tiles = tiles.len(), "Clearing canvas");
        for tile in &tiles {
            self.release_tile(tile);
        }
        self.last_rendered_level = None;
        self.needs_redraw = true;
    }

    /// Tear down: stop the executor, release every tile and drop any
    /// scheduled render. The canvas cannot be used afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.executor.shutdown_now();
        self.clear();
        self.throttle.cancel();

        // Results still queued belong to cancelled batches
        while self.events.try_recv().is_ok() {}
        self.pool.purge();

        self.in_flight = None;
        self.is_rendering = false;
        let aborted = std::mem::take(&mut self.started);
        if let Some(listener) = self.listener.as_mut() {
            for _ in &aborted {
                listener.on_render_cancelled();
            }
        }
        self.destroyed = true;
        debug!("Canvas destroyed");
    }

    /// Start a render cycle now if rendering is allowed.
    pub fn render_tiles(&mut self) {
        if self.destroyed || !self.phase.allows_render() {
            trace!(phase = %self.phase, "Render cycle not allowed");
            return;
        }
        let Some(level) = self.detail_level_to_render.clone() else {
            return;
        };
        self.begin_render_task(level.as_ref());
    }

    fn begin_render_task(&mut self, level: &dyn DetailLevel) {
        let changed = level.compute_current_state();
        let id = level.level_id();
        if !changed && self.last_rendered_level == Some(id) {
            debug!(level = %id, "Viewport unchanged, skipping render cycle");
            return;
        }

        let mut visible = level.visible_tiles();
        let offered = visible.len();
        visible.retain(|tile| !tile.state().is_destroyed());
        if visible.len() < offered {
            debug!(
                level = %id,
                skipped = offered - visible.len(),
                "Detail level offered destroyed tiles"
            );
        }

        let evicted = self.sets.apply_visible(visible);
        for tile in &evicted {
            self.release_tile(tile);
        }

        let queue = self.sets.plan_decode();
        debug!(
            level = %id,
            in_viewport = self.sets.in_viewport().len(),
            evicted = evicted.len(),
            queued = queue.len(),
            "Starting render cycle"
        );

        if let Some(batch) = self.executor.queue(queue) {
            self.in_flight = Some(batch);
        }
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Apply pending worker events and run a render cycle if one is due.
    ///
    /// Returns the number of events handled.
    pub fn tick(&mut self) -> usize {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> usize {
        let handled = self.process_events();
        if self.throttle.fire_if_due(now) {
            self.render_tiles();
        }
        handled
    }

    /// Wait up to `timeout` for a worker event or the scheduled render,
    /// then tick.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        if self.destroyed {
            return 0;
        }

        let now = Instant::now();
        let mut deadline = now + timeout;
        if let Some(render_at) = self.throttle.deadline() {
            deadline = deadline.min(render_at);
        }
        let wait = deadline.saturating_duration_since(now);

        let events = &mut self.events;
        let received = self
            .executor
            .block_on(async { tokio::time::timeout(wait, events.recv()).await });

        let mut handled = 0;
        if let Some(Ok(Some(event))) = received {
            self.dispatch(event);
            handled += 1;
        }
        handled + self.tick()
    }

    /// Pump until idle or until `timeout` passes. Returns true if idle.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if self.is_idle() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.pump(deadline - now);
        }
    }

    fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    fn dispatch(&mut self, event: RenderEvent) {
        let RenderEvent { batch, kind } = event;
        match kind {
            RenderEventKind::PreExecute => self.on_pre_execute(batch),
            RenderEventKind::TileDecoded { tile, bitmap } => {
                self.on_tile_decoded(batch, tile, bitmap)
            }
            RenderEventKind::TileFailed { tile, error } => self.on_tile_failed(batch, tile, error),
            RenderEventKind::TileAbandoned { tile } => tile.abandon_decode(batch),
            RenderEventKind::Exception { error } => self.on_exception(batch, error),
            RenderEventKind::Cancelled => self.on_cancelled(batch),
            RenderEventKind::PostExecute => self.on_post_execute(batch),
        }
    }

    // =========================================================================
    // Executor callbacks
    // =========================================================================

    fn on_pre_execute(&mut self, batch: BatchId) {
        if self.in_flight != Some(batch) {
            return;
        }
        self.started.insert(batch);
        self.is_rendering = true;
        if let Some(listener) = self.listener.as_mut() {
            listener.on_render_start();
        }
    }

    /// Validate a decoded tile and make it ready to draw.
    fn on_tile_decoded(&mut self, batch: BatchId, tile: SharedTile, bitmap: Bitmap) {
        if !self.executor.is_batch_live(batch) {
            trace!(tile = %tile.key(), batch = %batch, "Discarding decode from cancelled batch");
            tile.abandon_decode(batch);
            self.discard_bitmap(bitmap);
            return;
        }

        let admission = self.sets.admission(&tile);
        if admission != Admission::Admitted {
            trace!(tile = %tile.key(), ?admission, "Discarding stale decode");
            tile.abandon_decode(batch);
            self.discard_bitmap(bitmap);
            return;
        }

        if let Err(bitmap) = tile.install_bitmap(batch, bitmap) {
            trace!(tile = %tile.key(), "Tile no longer accepts this bitmap");
            self.discard_bitmap(bitmap);
            return;
        }

        tile.set_transitions_enabled(self.config.transitions_enabled);
        tile.set_transition_duration(self.config.transition_duration);
        tile.stamp_time();
        trace!(tile = %tile.key(), "Tile ready to draw");
        self.sets.insert_ready(tile);
        self.needs_redraw = true;
    }

    fn on_tile_failed(&mut self, batch: BatchId, tile: SharedTile, error: DecodeError) {
        tile.abandon_decode(batch);
        if !self.executor.is_batch_live(batch) {
            trace!(tile = %tile.key(), error = %error, "Ignoring failure from cancelled batch");
            return;
        }

        self.sets.remove_queued(&tile);
        warn!(tile = %tile.key(), batch = %batch, error = %error, "Tile decode failed");
        if let Some(listener) = self.listener.as_mut() {
            listener.on_tile_decode_failed(&tile, &error);
        }
    }

    fn on_exception(&mut self, batch: BatchId, error: DecodeError) {
        self.handle_tile_render_exception(batch, &error);
    }

    /// Recover from a batch-level failure.
    ///
    /// Resource exhaustion purges the bitmap pool; the batch itself is already
    /// aborted and reports cancellation next.
    fn handle_tile_render_exception(&mut self, batch: BatchId, error: &DecodeError) {
        if error.is_resource_exhaustion() {
            let freed = self.pool.purge();
            warn!(batch = %batch, freed_bytes = freed, "Out of memory while decoding tiles");
            if self.in_flight == Some(batch) {
                self.last_rendered_level = None;
            }
        } else {
            warn!(batch = %batch, error = %error, "Render batch failed");
        }
    }

    fn on_cancelled(&mut self, batch: BatchId) {
        if self.in_flight == Some(batch) {
            self.in_flight = None;
            // Tiles of the aborted cycle may still need decoding
            self.last_rendered_level = None;
        }
        if !self.started.remove(&batch) {
            debug!(batch = %batch, "Batch cancelled before it started");
            return;
        }
        debug!(batch = %batch, "Render cycle cancelled");
        self.is_rendering = !self.started.is_empty();
        if let Some(listener) = self.listener.as_mut() {
            listener.on_render_cancelled();
        }
    }

    fn on_post_execute(&mut self, batch: BatchId) {
        // Superseded, or cancelled after its last tile finished: results
        // were discarded
        if !self.executor.is_batch_live(batch) {
            self.on_cancelled(batch);
            return;
        }
        if self.in_flight != Some(batch) {
            return;
        }

        self.in_flight = None;
        let reported = self.started.remove(&batch);
        self.is_rendering = !self.started.is_empty();
        if reported {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_render_complete();
            }
        }
        self.last_rendered_level = self
            .detail_level_to_render
            .as_ref()
            .map(|level| level.level_id());
        self.request_render();
    }

    // =========================================================================
    // Compositing
    // =========================================================================

    /// Draw ready tiles intersecting the surface clip.
    ///
    /// Returns true if some tile is still fading in and the host should draw
    /// again.
    pub fn draw_tiles<S: Surface + ?Sized>(&mut self, surface: &mut S) -> bool {
        let mut scaled = ScaledSurface::new(surface, self.scale);
        let clip = scaled.clip_bounds();
        let now = Instant::now();

        let dirty = self
            .sets
            .composite(clip, |tile| tile.draw_at(&mut scaled, now));
        self.needs_redraw = dirty;
        dirty
    }

    // =========================================================================
    // Bitmap release
    // =========================================================================

    fn release_tile(&self, tile: &SharedTile) {
        if let Some(bitmap) = tile.destroy(self.config.should_recycle_bitmaps) {
            self.pool.recycle(bitmap);
        }
    }

    fn discard_bitmap(&self, bitmap: Bitmap) {
        self.executor.decode_context().release(bitmap);
    }
}

impl std::fmt::Debug for TileCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCanvas")
            .field("scale", &self.scale)
            .field("phase", &self.phase)
            .field("is_rendering", &self.is_rendering)
            .field("in_flight", &self.in_flight)
            .field("started", &self.started.len())
            .field("in_viewport", &self.sets.in_viewport().len())
            .field("ready_to_draw", &self.sets.ready_to_draw().len())
            .field("already_rendered", &self.sets.already_rendered().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::GridDetailLevel;
    use crate::geom::PixelRect;
    use crate::provider::PatternBitmapProvider;
    use crate::tile::TileState;

    fn canvas() -> TileCanvas {
        let config = CanvasConfig::default()
            .with_render_buffer(Duration::ZERO)
            .with_transitions_enabled(false);
        TileCanvas::new(config, Arc::new(PatternBitmapProvider::new())).unwrap()
    }

    fn grid(viewport: PixelRect) -> Arc<GridDetailLevel> {
        let level = Arc::new(GridDetailLevel::new(1.0, 32, 32, 256, 256));
        level.set_viewport(viewport);
        level
    }

    #[test]
    fn test_request_without_level_schedules_nothing() {
        let mut canvas = canvas();
        canvas.request_render();
        assert!(canvas.is_idle());
        assert_eq!(canvas.phase(), RenderCyclePhase::Active);
    }

    #[test]
    fn test_set_detail_level_same_level_is_noop() {
        let mut canvas = canvas();
        canvas.set_detail_level(grid(PixelRect::new(0, 0, 32, 32)));
        assert!(canvas.run_until_idle(Duration::from_secs(5)));

        canvas.suppress_render();
        canvas.set_detail_level(grid(PixelRect::new(0, 0, 64, 64)));
        assert_eq!(canvas.phase(), RenderCyclePhase::Suppressed);
        assert!(canvas.is_idle());
    }

    #[test]
    fn test_suppressed_cycle_does_not_start() {
        let mut canvas = canvas();
        canvas.set_detail_level(grid(PixelRect::new(0, 0, 32, 32)));
        canvas.suppress_render();

        assert!(canvas.run_until_idle(Duration::from_secs(5)));
        assert!(canvas.tile_sets().in_viewport().is_empty());
    }

    #[test]
    fn test_cancel_then_suppress_stays_cancelled() {
        let mut canvas = canvas();
        canvas.cancel_render();
        canvas.suppress_render();
        assert_eq!(canvas.phase(), RenderCyclePhase::Cancelled);

        canvas.request_render();
        assert_eq!(canvas.phase(), RenderCyclePhase::Active);
    }

    #[test]
    fn test_render_and_draw() {
        let mut canvas = canvas();
        canvas.set_detail_level(grid(PixelRect::new(0, 0, 64, 32)));
        assert!(canvas.run_until_idle(Duration::from_secs(5)));

        assert_eq!(canvas.tile_sets().ready_to_draw().len(), 2);
        assert!(canvas.take_invalidation());
        assert!(!canvas.take_invalidation());

        let mut surface = crate::surface::PixmapSurface::new(256, 256).unwrap();
        assert!(!canvas.draw_tiles(&mut surface));
        assert_eq!(canvas.tile_sets().already_rendered().len(), 2);
        assert!(canvas.tile_sets().ready_to_draw().is_empty());
        assert!(canvas.last_rendered_level().is_some());
    }

    #[test]
    fn test_clear_destroys_tiles_and_forces_rebuild() {
        let mut canvas = canvas();
        canvas.set_detail_level(grid(PixelRect::new(0, 0, 32, 32)));
        assert!(canvas.run_until_idle(Duration::from_secs(5)));
        let old = Arc::clone(canvas.tile_sets().in_viewport().iter().next().unwrap());

        canvas.clear();
        assert_eq!(old.state(), TileState::Destroyed);
        assert!(canvas.tile_sets().is_empty());
        assert_eq!(canvas.phase(), RenderCyclePhase::Cancelled);
        assert!(canvas.last_rendered_level().is_none());

        canvas.request_render();
        assert!(canvas.run_until_idle(Duration::from_secs(5)));
        assert_eq!(canvas.tile_sets().ready_to_draw().len(), 1);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut canvas = canvas();
        canvas.set_detail_level(grid(PixelRect::new(0, 0, 64, 64)));
        assert!(canvas.run_until_idle(Duration::from_secs(5)));

        canvas.destroy();
        assert!(canvas.is_destroyed());
        assert!(canvas.is_idle());
        assert!(canvas.tile_sets().is_empty());
        assert_eq!(canvas.bitmap_pool().stats().pooled_bytes, 0);

        // Further requests are ignored
        canvas.request_render();
        assert!(canvas.is_idle());
        assert_eq!(canvas.pump(Duration::from_millis(10)), 0);
    }

    #[test]
    fn test_set_scale_requests_redraw() {
        let mut canvas = canvas();
        canvas.set_scale(0.5);
        assert_eq!(canvas.scale(), 0.5);
        assert!(canvas.take_invalidation());
    }
}
