//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::defaults::MAX_DECODE_THREADS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [render] section
    if let Some(section) = ini.section(Some("render")) {
        if let Some(v) = section.get("buffer_ms") {
            config.render.buffer_ms = parse_millis("render", "buffer_ms", v)?;
        }
        if let Some(v) = section.get("recycle_bitmaps") {
            config.render.recycle_bitmaps = parse_bool("render", "recycle_bitmaps", v)?;
        }
    }

    // [transition] section
    if let Some(section) = ini.section(Some("transition")) {
        if let Some(v) = section.get("enabled") {
            config.transition.enabled = parse_bool("transition", "enabled", v)?;
        }
        if let Some(v) = section.get("duration_ms") {
            config.transition.duration_ms = parse_millis("transition", "duration_ms", v)?;
        }
    }

    // [decode] section
    if let Some(section) = ini.section(Some("decode")) {
        if let Some(v) = section.get("threads") {
            let v = v.trim();
            if !v.is_empty() && !v.eq_ignore_ascii_case("auto") {
                config.decode.threads = v
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n <= MAX_DECODE_THREADS)
                    .ok_or_else(|| ConfigFileError::InvalidValue {
                        section: "decode".to_string(),
                        key: "threads".to_string(),
                        value: v.to_string(),
                        reason: format!("expected 'auto' or a number up to {}", MAX_DECODE_THREADS),
                    })?;
            }
        }
        if let Some(v) = section.get("pool_size") {
            config.decode.pool_size = parse_size(v).map_err(|_| ConfigFileError::InvalidValue {
                section: "decode".to_string(),
                key: "pool_size".to_string(),
                value: v.to_string(),
                reason: "expected format like '64MB', '512KB', or '1GB'".to_string(),
            })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn parse_millis(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a whole number of milliseconds".to_string(),
        })
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_overlays_values() {
        let config = parse(
            "[render]\nbuffer_ms = 15\nrecycle_bitmaps = false\n\
             [transition]\nenabled = no\nduration_ms = 500\n\
             [decode]\nthreads = 4\npool_size = 16MB\n\
             [logging]\nfile = custom.log\n",
        )
        .unwrap();

        assert_eq!(config.render.buffer_ms, 15);
        assert!(!config.render.recycle_bitmaps);
        assert!(!config.transition.enabled);
        assert_eq!(config.transition.duration_ms, 500);
        assert_eq!(config.decode.threads, 4);
        assert_eq!(config.decode.pool_size, 16 * 1024 * 1024);
        assert_eq!(config.logging.file, "custom.log");
    }

    #[test]
    fn test_auto_threads() {
        let config = parse("[decode]\nthreads = auto\n").unwrap();
        assert_eq!(config.decode.threads, 0);
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let err = parse("[render]\nbuffer_ms = soon\n").unwrap_err();
        assert!(err.to_string().contains("render.buffer_ms"));

        let err = parse("[decode]\npool_size = lots\n").unwrap_err();
        assert!(err.to_string().contains("decode.pool_size"));

        let err = parse("[transition]\nenabled = maybe\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { .. }));

        assert!(parse("[decode]\nthreads = 100000\n").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/var/log"), PathBuf::from("/var/log"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/logs"), home.join("logs"));
        }
    }
}
