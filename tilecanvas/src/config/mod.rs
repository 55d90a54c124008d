//! Configuration for the tile canvas.
//!
//! [`CanvasConfig`] is the runtime configuration handed to
//! [`TileCanvas::new`](crate::canvas::TileCanvas::new). [`ConfigFile`] is its
//! on-disk form at `~/.tilecanvas/config.ini`:
//!
//! ```ini
//! [render]
//! buffer_ms = 250
//! recycle_bitmaps = true
//!
//! [transition]
//! enabled = true
//! duration_ms = 200
//!
//! [decode]
//! threads = auto
//! pool_size = 64MB
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{
    config_directory, config_file_path, default_log_directory, AUTO_DECODE_THREADS,
    DEFAULT_LOG_FILE, DEFAULT_POOL_SIZE, DEFAULT_RECYCLE_BITMAPS, DEFAULT_RENDER_BUFFER_MS,
    DEFAULT_TRANSITIONS_ENABLED, DEFAULT_TRANSITION_DURATION_MS, MAX_DECODE_THREADS,
};
pub use file::ConfigFileError;
pub use settings::{ConfigFile, DecodeSettings, LoggingSettings, RenderSettings, TransitionSettings};
pub use size::{format_size, parse_size, SizeParseError};

use crate::bitmap::DEFAULT_POOL_CAPACITY_BYTES;
use crate::canvas::DEFAULT_RENDER_BUFFER;
use crate::executor::ExecutorConfig;
use crate::tile::DEFAULT_TRANSITION_DURATION;
use std::time::Duration;

/// Runtime configuration of a [`TileCanvas`](crate::canvas::TileCanvas).
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Throttle window between a render request and the render cycle.
    pub render_buffer: Duration,
    /// Fade tiles in after decoding.
    pub transitions_enabled: bool,
    pub transition_duration: Duration,
    /// Return bitmaps of destroyed tiles to the pool.
    pub should_recycle_bitmaps: bool,
    /// Bitmap pool capacity in bytes.
    pub bitmap_pool_bytes: usize,
    pub executor: ExecutorConfig,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            render_buffer: DEFAULT_RENDER_BUFFER,
            transitions_enabled: DEFAULT_TRANSITIONS_ENABLED,
            transition_duration: DEFAULT_TRANSITION_DURATION,
            should_recycle_bitmaps: DEFAULT_RECYCLE_BITMAPS,
            bitmap_pool_bytes: DEFAULT_POOL_CAPACITY_BYTES,
            executor: ExecutorConfig::default(),
        }
    }
}

impl CanvasConfig {
    pub fn with_render_buffer(mut self, buffer: Duration) -> Self {
        self.render_buffer = buffer;
        self
    }

    pub fn with_transitions_enabled(mut self, enabled: bool) -> Self {
        self.transitions_enabled = enabled;
        self
    }

    pub fn with_transition_duration(mut self, duration: Duration) -> Self {
        self.transition_duration = duration;
        self
    }

    pub fn with_recycle_bitmaps(mut self, recycle: bool) -> Self {
        self.should_recycle_bitmaps = recycle;
        self
    }

    pub fn with_bitmap_pool_bytes(mut self, bytes: usize) -> Self {
        self.bitmap_pool_bytes = bytes;
        self
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_decode_threads(mut self, threads: usize) -> Self {
        self.executor = self.executor.with_decode_threads(threads);
        self
    }
}

impl From<&ConfigFile> for CanvasConfig {
    fn from(file: &ConfigFile) -> Self {
        let mut config = CanvasConfig::default()
            .with_render_buffer(Duration::from_millis(file.render.buffer_ms))
            .with_recycle_bitmaps(file.render.recycle_bitmaps)
            .with_transitions_enabled(file.transition.enabled)
            .with_transition_duration(Duration::from_millis(file.transition.duration_ms))
            .with_bitmap_pool_bytes(file.decode.pool_size);
        if file.decode.threads != AUTO_DECODE_THREADS {
            config = config.with_decode_threads(file.decode.threads);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MIN_DECODE_THREADS;

    #[test]
    fn test_defaults_match_file_defaults() {
        let from_file = CanvasConfig::from(&ConfigFile::default());
        let default = CanvasConfig::default();

        assert_eq!(from_file.render_buffer, default.render_buffer);
        assert_eq!(from_file.transition_duration, default.transition_duration);
        assert_eq!(from_file.bitmap_pool_bytes, default.bitmap_pool_bytes);
        assert!(from_file.executor.decode_threads >= MIN_DECODE_THREADS);
    }

    #[test]
    fn test_from_file_applies_overrides() {
        let mut file = ConfigFile::default();
        file.render.buffer_ms = 15;
        file.render.recycle_bitmaps = false;
        file.transition.enabled = false;
        file.decode.threads = 3;

        let config = CanvasConfig::from(&file);
        assert_eq!(config.render_buffer, Duration::from_millis(15));
        assert!(!config.should_recycle_bitmaps);
        assert!(!config.transitions_enabled);
        assert_eq!(config.executor.decode_threads, 3);
    }
}
