//! Settings structs backing `config.ini`.

use super::defaults::*;
use std::path::PathBuf;

/// Contents of the configuration file, one struct per INI section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub render: RenderSettings,
    pub transition: TransitionSettings,
    pub decode: DecodeSettings,
    pub logging: LoggingSettings,
}

/// `[render]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Throttle window between a render request and the render, in ms.
    pub buffer_ms: u64,
    /// Return bitmaps of destroyed tiles to the pool.
    pub recycle_bitmaps: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            buffer_ms: DEFAULT_RENDER_BUFFER_MS,
            recycle_bitmaps: DEFAULT_RECYCLE_BITMAPS,
        }
    }
}

/// `[transition]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSettings {
    pub enabled: bool,
    pub duration_ms: u64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_TRANSITIONS_ENABLED,
            duration_ms: DEFAULT_TRANSITION_DURATION_MS,
        }
    }
}

/// `[decode]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeSettings {
    /// Concurrent decodes; [`AUTO_DECODE_THREADS`] picks from the host.
    pub threads: usize,
    /// Bitmap pool capacity in bytes.
    pub pool_size: usize,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            threads: AUTO_DECODE_THREADS,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}
