//! Byte-bounded pool of reusable pixel buffers.

use super::Bitmap;
use crate::provider::DecodeError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Default pool capacity (64 MB).
pub const DEFAULT_POOL_CAPACITY_BYTES: usize = 64 * 1024 * 1024;

/// Counters describing pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers handed out from the pool.
    pub reused: u64,
    /// Buffers freshly allocated because none were pooled.
    pub allocated: u64,
    /// Buffers accepted back into the pool.
    pub recycled: u64,
    /// Buffers dropped because the pool was full.
    pub rejected: u64,
    /// Bytes currently held.
    pub pooled_bytes: usize,
}

#[derive(Debug, Default)]
struct PoolInner {
    buffers: HashMap<(u32, u32), Vec<Vec<u8>>>,
    bytes: usize,
}

/// Pool of pixel buffers keyed by bitmap dimensions.
///
/// Shared between the owning thread (which recycles buffers of destroyed
/// tiles) and decode workers (which acquire buffers through the decode
/// context).
#[derive(Debug)]
pub struct BitmapPool {
    capacity_bytes: usize,
    inner: Mutex<PoolInner>,
    reused: AtomicU64,
    allocated: AtomicU64,
    recycled: AtomicU64,
    rejected: AtomicU64,
}

impl BitmapPool {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            inner: Mutex::new(PoolInner::default()),
            reused: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Get a cleared bitmap of the given size, reusing a pooled buffer when
    /// one is available.
    pub fn acquire(&self, width: u32, height: u32) -> Result<Bitmap, DecodeError> {
        let reused = {
            let mut inner = self.inner.lock();
            let buffer = inner
                .buffers
                .get_mut(&(width, height))
                .and_then(|list| list.pop());
            if let Some(ref buffer) = buffer {
                inner.bytes -= buffer.len();
            }
            buffer
        };

        match reused {
            Some(mut buffer) => {
                buffer.fill(0);
                self.reused.fetch_add(1, Ordering::Relaxed);
                Bitmap::from_buffer(buffer, width, height)
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Bitmap::new(width, height)
            }
        }
    }

    /// Return a bitmap's buffer to the pool.
    ///
    /// The buffer is dropped if keeping it would exceed the capacity.
    pub fn recycle(&self, bitmap: Bitmap) {
        let key = (bitmap.width(), bitmap.height());
        let len = bitmap.byte_len();

        let mut inner = self.inner.lock();
        if inner.bytes + len > self.capacity_bytes {
            drop(inner);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            trace!(width = key.0, height = key.1, "Bitmap pool full, dropping buffer");
            return;
        }

        inner.bytes += len;
        inner
            .buffers
            .entry(key)
            .or_default()
            .push(bitmap.into_buffer());
        self.recycled.fetch_add(1, Ordering::Relaxed);
    }

    /// Release every pooled buffer, returning the number of bytes freed.
    pub fn purge(&self) -> usize {
        let mut inner = self.inner.lock();
        let freed = inner.bytes;
        inner.buffers.clear();
        inner.bytes = 0;
        drop(inner);

        if freed > 0 {
            debug!(bytes = freed, "Purged bitmap pool");
        }
        freed
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            reused: self.reused.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pooled_bytes: self.inner.lock().bytes,
        }
    }
}

impl Default for BitmapPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_allocates_when_empty() {
        let pool = BitmapPool::new(1024);
        let bitmap = pool.acquire(4, 4).unwrap();

        assert_eq!(bitmap.byte_len(), 64);
        assert_eq!(pool.stats().allocated, 1);
        assert_eq!(pool.stats().reused, 0);
    }

    #[test]
    fn test_recycled_buffer_is_reused_and_cleared() {
        let pool = BitmapPool::new(1024);
        let mut bitmap = pool.acquire(4, 4).unwrap();
        bitmap.fill_rgba(255, 255, 255, 255);
        pool.recycle(bitmap);
        assert_eq!(pool.stats().pooled_bytes, 64);

        let again = pool.acquire(4, 4).unwrap();
        assert!(again.pixmap().data().iter().all(|b| *b == 0));

        let stats = pool.stats();
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.pooled_bytes, 0);
    }

    #[test]
    fn test_buffers_keyed_by_dimensions() {
        let pool = BitmapPool::new(1024);
        pool.recycle(Bitmap::new(4, 4).unwrap());

        let _ = pool.acquire(2, 8).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.reused, 0);
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.pooled_bytes, 64);
    }

    #[test]
    fn test_recycle_respects_capacity() {
        let pool = BitmapPool::new(100);
        pool.recycle(Bitmap::new(4, 4).unwrap());
        pool.recycle(Bitmap::new(4, 4).unwrap());

        let stats = pool.stats();
        assert_eq!(stats.recycled, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.pooled_bytes, 64);
    }

    #[test]
    fn test_purge_releases_everything() {
        let pool = BitmapPool::new(1024);
        pool.recycle(Bitmap::new(4, 4).unwrap());
        pool.recycle(Bitmap::new(2, 2).unwrap());

        assert_eq!(pool.purge(), 80);
        assert_eq!(pool.stats().pooled_bytes, 0);
        assert_eq!(pool.purge(), 0);
    }
}
