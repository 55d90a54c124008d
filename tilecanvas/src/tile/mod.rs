//! Tiles: the unit of decoding, caching and compositing.
//!
//! A [`Tile`] is one cell of a detail level's grid. Its identity is
//! `(column, row, scale)` and never changes; equality and hashing use the
//! identity only, so a freshly computed tile compares equal to the instance
//! already held by the canvas regardless of either one's decode state.
//!
//! Mutable state (lifecycle, bitmap, fade-in) lives behind a mutex so that
//! tiles can be shared as [`SharedTile`] between the owning thread and decode
//! workers. Workers never install bitmaps themselves: the owning thread does
//! that through [`Tile::install_bitmap`] after validating the result.
//!
//! # Example
//!
//! ```
//! use tilecanvas::tile::{Tile, TileState};
//!
//! let a = Tile::new(3, 4, 256, 256, 0.5);
//! let b = Tile::new(3, 4, 256, 256, 0.5);
//! a.destroy(true);
//!
//! assert_eq!(a, b);
//! assert_eq!(a.state(), TileState::Destroyed);
//! assert_eq!(b.state(), TileState::Unassigned);
//! ```

mod state;
mod transition;

pub use state::TileState;
pub use transition::{Transition, DEFAULT_TRANSITION_DURATION};

use crate::bitmap::Bitmap;
use crate::executor::BatchId;
use crate::geom::PixelRect;
use crate::provider::{BitmapProvider, DecodeContext, DecodeError};
use crate::surface::Surface;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// A tile shared between the canvas sets and decode workers.
pub type SharedTile = Arc<Tile>;

/// Opaque provider-defined payload attached to a tile.
pub type TileData = Arc<dyn Any + Send + Sync>;

// =============================================================================
// Identity
// =============================================================================

/// Detail level scale, compared by exact value.
#[derive(Debug, Clone, Copy)]
pub struct LevelScale(f32);

impl LevelScale {
    pub fn new(scale: f32) -> Self {
        // -0.0 and 0.0 must hash alike
        Self(if scale == 0.0 { 0.0 } else { scale })
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl PartialEq for LevelScale {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for LevelScale {}

impl Hash for LevelScale {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for LevelScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable identity of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub column: u32,
    pub row: u32,
    pub scale: LevelScale,
}

impl TileKey {
    pub fn new(column: u32, row: u32, scale: f32) -> Self {
        Self {
            column,
            row,
            scale: LevelScale::new(scale),
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})@{}", self.column, self.row, self.scale)
    }
}

// =============================================================================
// Tile
// =============================================================================

#[derive(Debug, Default)]
struct TileInner {
    state: TileState,
    bitmap: Option<Bitmap>,
    /// Batch that last queued this tile for decode.
    ticket: Option<BatchId>,
    transition: Transition,
}

/// One cell of a detail level grid.
pub struct Tile {
    key: TileKey,
    width: u32,
    height: u32,
    native_rect: PixelRect,
    scaled_rect: PixelRect,
    data: Option<TileData>,
    inner: Mutex<TileInner>,
}

impl Tile {
    /// Create a tile at grid position `(column, row)` of a level with the
    /// given tile size and scale.
    pub fn new(column: u32, row: u32, width: u32, height: u32, scale: f32) -> Self {
        let left = (column as i64 * width as i64) as i32;
        let top = (row as i64 * height as i64) as i32;
        let native_rect = PixelRect::from_xywh(left, top, width as i32, height as i32);

        Self {
            key: TileKey::new(column, row, scale),
            width,
            height,
            native_rect,
            scaled_rect: native_rect.unscaled(scale),
            data: None,
            inner: Mutex::new(TileInner::default()),
        }
    }

    /// Attach a provider-defined data token.
    pub fn with_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    /// Attach an already shared data token.
    pub fn with_shared_data(mut self, data: TileData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn column(&self) -> u32 {
        self.key.column
    }

    pub fn row(&self) -> u32 {
        self.key.row
    }

    pub fn scale(&self) -> f32 {
        self.key.scale.value()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn left(&self) -> i32 {
        self.native_rect.left
    }

    pub fn top(&self) -> i32 {
        self.native_rect.top
    }

    /// Position within the detail level's own grid.
    pub fn native_rect(&self) -> PixelRect {
        self.native_rect
    }

    /// Position relative to the full-resolution image.
    pub fn scaled_rect(&self) -> PixelRect {
        self.scaled_rect
    }

    /// `(0, 0, width, height)`: the source region of the bitmap.
    pub fn intrinsic_rect(&self) -> PixelRect {
        PixelRect::from_size(self.width as i32, self.height as i32)
    }

    /// The data token, if present and of type `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref().and_then(|data| data.downcast_ref::<T>())
    }

    pub fn state(&self) -> TileState {
        self.inner.lock().state
    }

    pub fn has_bitmap(&self) -> bool {
        self.inner.lock().bitmap.is_some()
    }

    /// Run `f` against the bitmap, if one is installed.
    pub fn with_bitmap<R>(&self, f: impl FnOnce(&Bitmap) -> R) -> Option<R> {
        self.inner.lock().bitmap.as_ref().map(f)
    }

    // -------------------------------------------------------------------------
    // Decoding
    // -------------------------------------------------------------------------

    /// Decode and install the bitmap synchronously.
    ///
    /// Returns `Ok(false)` without decoding if a bitmap is already installed or
    /// the tile is destroyed. If a concurrent call installs a bitmap first, the
    /// bitmap produced here is released through the context.
    pub fn generate_bitmap(
        &self,
        provider: &dyn BitmapProvider,
        context: &DecodeContext,
    ) -> Result<bool, DecodeError> {
        {
            let inner = self.inner.lock();
            if inner.bitmap.is_some() || inner.state.is_destroyed() {
                return Ok(false);
            }
        }

        let bitmap = provider.decode(self, context)?;

        let mut inner = self.inner.lock();
        if inner.bitmap.is_some() || inner.state.is_destroyed() {
            drop(inner);
            context.release(bitmap);
            return Ok(false);
        }
        inner.bitmap = Some(bitmap);
        inner.state = TileState::Decoded;
        inner.ticket = None;
        Ok(true)
    }

    /// Mark the tile as queued by `batch`.
    ///
    /// Returns false if the tile needs no decode (already decoded or
    /// destroyed).
    pub(crate) fn mark_pending(&self, batch: BatchId) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.is_destroyed() || inner.bitmap.is_some() {
            return false;
        }
        inner.state = TileState::PendingDecode;
        inner.ticket = Some(batch);
        true
    }

    /// Install a bitmap decoded for `batch`.
    ///
    /// Rejects (and hands back) the bitmap if the tile was destroyed, already
    /// has a bitmap, or has since been queued by another batch.
    pub(crate) fn install_bitmap(&self, batch: BatchId, bitmap: Bitmap) -> Result<(), Bitmap> {
        let mut inner = self.inner.lock();
        if inner.state.is_destroyed() || inner.bitmap.is_some() || inner.ticket != Some(batch) {
            return Err(bitmap);
        }
        inner.bitmap = Some(bitmap);
        inner.state = TileState::Decoded;
        inner.ticket = None;
        Ok(())
    }

    /// Forget that `batch` is decoding this tile. The tile stays pending.
    pub(crate) fn abandon_decode(&self, batch: BatchId) {
        let mut inner = self.inner.lock();
        if inner.ticket == Some(batch) {
            inner.ticket = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn decode_ticket(&self) -> Option<BatchId> {
        self.inner.lock().ticket
    }

    /// Tear the tile down.
    ///
    /// The bitmap is released; when `should_recycle` is set it is handed back
    /// so its buffer can be pooled, otherwise it is dropped here. Calling this
    /// again returns `None`.
    pub fn destroy(&self, should_recycle: bool) -> Option<Bitmap> {
        let mut inner = self.inner.lock();
        if !inner.state.is_destroyed() {
            trace!(tile = %self.key, state = %inner.state, "Destroying tile");
        }
        inner.state = TileState::Destroyed;
        inner.ticket = None;
        let bitmap = inner.bitmap.take();
        drop(inner);

        if should_recycle {
            bitmap
        } else {
            None
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    pub fn set_transitions_enabled(&self, enabled: bool) {
        self.inner.lock().transition.set_enabled(enabled);
    }

    pub fn set_transition_duration(&self, duration: Duration) {
        self.inner.lock().transition.set_duration(duration);
    }

    /// Start the fade-in now.
    pub fn stamp_time(&self) {
        self.stamp_time_at(Instant::now());
    }

    pub fn stamp_time_at(&self, now: Instant) {
        self.inner.lock().transition.stamp(now);
    }

    pub fn compute_opacity(&self) -> f32 {
        self.compute_opacity_at(Instant::now())
    }

    pub fn compute_opacity_at(&self, now: Instant) -> f32 {
        self.inner.lock().transition.opacity_at(now)
    }

    /// True while the tile is fading in, and once more after it finishes.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty_at(Instant::now())
    }

    pub fn is_dirty_at(&self, now: Instant) -> bool {
        self.inner.lock().transition.is_dirty_at(now)
    }

    // -------------------------------------------------------------------------
    // Compositing
    // -------------------------------------------------------------------------

    /// Composite the bitmap into the tile's scaled rectangle.
    ///
    /// Returns whether the tile still needs redrawing.
    pub fn draw<S: Surface + ?Sized>(&self, surface: &mut S) -> bool {
        self.draw_at(surface, Instant::now())
    }

    pub fn draw_at<S: Surface + ?Sized>(&self, surface: &mut S, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        let TileInner {
            bitmap, transition, ..
        } = &mut *inner;

        if let Some(bitmap) = bitmap.as_ref() {
            let opacity = transition.opacity_at(now);
            let (src, dst) = self.draw_rects(bitmap);
            trace!(tile = %self.key, dst = %dst, opacity, "Drawing tile");
            surface.draw_bitmap(bitmap, src, dst, opacity);
        }
        transition.is_dirty_at(now)
    }

    /// Source and destination rectangles for `bitmap`.
    ///
    /// Bitmaps smaller than the tile (edge tiles) cover a proportionally
    /// smaller destination instead of being stretched.
    fn draw_rects(&self, bitmap: &Bitmap) -> (PixelRect, PixelRect) {
        let bitmap_rect = PixelRect::from_size(bitmap.width() as i32, bitmap.height() as i32);
        let src = self
            .intrinsic_rect()
            .intersection(&bitmap_rect)
            .unwrap_or(bitmap_rect);

        let mut dst = self.scaled_rect;
        if src.width() < self.width as i32 {
            let ratio = src.width() as f32 / self.width as f32;
            dst.right = dst.left + (dst.width() as f32 * ratio).round() as i32;
        }
        if src.height() < self.height as i32 {
            let ratio = src.height() as f32 / self.height as f32;
            dst.bottom = dst.top + (dst.height() as f32 * ratio).round() as i32;
        }
        (src, dst)
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Tile {}

impl Hash for Tile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("column", &self.key.column)
            .field("row", &self.key.row)
            .field("scale", &self.key.scale.value())
            .field("state", &self.state())
            .finish()
    }
}
