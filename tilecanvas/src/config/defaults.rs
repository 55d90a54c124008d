//! Default configuration values.
//!
//! Durations are stored in milliseconds in the config file.

use crate::bitmap::DEFAULT_POOL_CAPACITY_BYTES;
use crate::canvas::DEFAULT_RENDER_BUFFER;
use crate::tile::DEFAULT_TRANSITION_DURATION;
use std::path::PathBuf;

pub const DEFAULT_RENDER_BUFFER_MS: u64 = DEFAULT_RENDER_BUFFER.as_millis() as u64;

pub const DEFAULT_TRANSITION_DURATION_MS: u64 = DEFAULT_TRANSITION_DURATION.as_millis() as u64;

pub const DEFAULT_TRANSITIONS_ENABLED: bool = true;

pub const DEFAULT_RECYCLE_BITMAPS: bool = true;

/// Decode thread count meaning "use available parallelism".
pub const AUTO_DECODE_THREADS: usize = 0;

pub const DEFAULT_POOL_SIZE: usize = DEFAULT_POOL_CAPACITY_BYTES;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "tilecanvas.log";

/// Upper bound accepted for `decode.threads`.
pub const MAX_DECODE_THREADS: usize = 256;

/// Get the path to the config directory (~/.tilecanvas).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilecanvas")
}

/// Get the path to the config file (~/.tilecanvas/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Default log directory (~/.tilecanvas/logs).
pub fn default_log_directory() -> PathBuf {
    config_directory().join("logs")
}
