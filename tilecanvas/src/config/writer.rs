//! INI serialization logic for converting `ConfigFile` → INI string.

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let threads = if config.decode.threads == 0 {
        "auto".to_string()
    } else {
        config.decode.threads.to_string()
    };

    format!(
        r#"[render]
; Delay between a render request and the render cycle, in milliseconds.
; Requests arriving inside the window are coalesced.
buffer_ms = {}
; Return bitmaps of tiles leaving the viewport to the bitmap pool
recycle_bitmaps = {}

[transition]
; Fade tiles in after they are decoded
enabled = {}
duration_ms = {}

[decode]
; Concurrent tile decodes ('auto' = number of CPU cores, at least 2)
threads = {}
; Maximum bytes of recycled bitmap memory kept for reuse
pool_size = {}

[logging]
directory = {}
file = {}
"#,
        config.render.buffer_ms,
        config.render.recycle_bitmaps,
        config.transition.enabled,
        config.transition.duration_ms,
        threads,
        format_size(config.decode.pool_size),
        config.logging.directory.display(),
        config.logging.file,
    )
}
