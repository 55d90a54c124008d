//! Bitmap providers: the decode routine behind every tile.
//!
//! A [`BitmapProvider`] turns a tile's identity and data token into pixels.
//! Providers run on decode worker threads and must be `Send + Sync`.
//!
//! # Implementors
//!
//! - [`FileBitmapProvider`] - Loads tile images from disk using a path pattern
//! - [`PatternBitmapProvider`] - Generates a synthetic checkerboard, useful for
//!   demos and tests
//!
//! # Example
//!
//! ```
//! use tilecanvas::bitmap::BitmapPool;
//! use tilecanvas::provider::{BitmapProvider, DecodeContext, PatternBitmapProvider};
//! use tilecanvas::tile::Tile;
//! use std::sync::Arc;
//!
//! let provider = PatternBitmapProvider::new();
//! let context = DecodeContext::new(Arc::new(BitmapPool::default()));
//! let tile = Tile::new(0, 0, 64, 64, 1.0);
//!
//! let bitmap = provider.decode(&tile, &context).unwrap();
//! assert_eq!(bitmap.width(), 64);
//! ```

mod error;
mod file;
mod pattern;

pub use error::DecodeError;
pub use file::{FileBitmapProvider, TilePattern};
pub use pattern::PatternBitmapProvider;

use crate::bitmap::{Bitmap, BitmapPool};
use crate::tile::Tile;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Trait for tile decode strategies.
///
/// `decode` is called synchronously on a worker thread and may block on I/O.
/// It must not touch any coordinator state; the returned bitmap is handed to
/// the owning thread, which decides whether to keep it.
pub trait BitmapProvider: Send + Sync {
    /// Produce the bitmap for `tile`.
    ///
    /// Buffers should be obtained through [`DecodeContext::allocate`] so that
    /// recycled memory is reused.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ResourceExhausted`] when memory runs out, which
    /// aborts the rest of the decode batch. Any other error fails only this
    /// tile.
    fn decode(&self, tile: &Tile, context: &DecodeContext) -> Result<Bitmap, DecodeError>;
}

/// Shared state available to providers while decoding.
///
/// Clones share the pool and the recycle flag.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    pool: Arc<BitmapPool>,
    recycle_bitmaps: Arc<AtomicBool>,
}

impl DecodeContext {
    pub fn new(pool: Arc<BitmapPool>) -> Self {
        Self {
            pool,
            recycle_bitmaps: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_recycle_bitmaps(self, recycle: bool) -> Self {
        self.set_recycle_bitmaps(recycle);
        self
    }

    /// Allocate a cleared bitmap, reusing pooled memory when possible.
    pub fn allocate(&self, width: u32, height: u32) -> Result<Bitmap, DecodeError> {
        self.pool.acquire(width, height)
    }

    /// Dispose of a bitmap nobody will draw.
    ///
    /// Its buffer goes back to the pool only while recycling is enabled.
    pub fn release(&self, bitmap: Bitmap) {
        if self.recycles_bitmaps() {
            self.pool.recycle(bitmap);
        }
    }

    pub fn set_recycle_bitmaps(&self, recycle: bool) {
        self.recycle_bitmaps.store(recycle, Ordering::Relaxed);
    }

    pub fn recycles_bitmaps(&self) -> bool {
        self.recycle_bitmaps.load(Ordering::Relaxed)
    }

    pub fn pool(&self) -> &BitmapPool {
        &self.pool
    }
}
