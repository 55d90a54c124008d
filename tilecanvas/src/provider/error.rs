//! Error types for bitmap decoding.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while producing a tile bitmap.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A pixel buffer could not be allocated.
    ///
    /// This is the only batch-level failure: the remaining decodes of the
    /// batch are abandoned and the bitmap pool is purged.
    #[error("Insufficient memory for a {bytes} byte pixel buffer")]
    ResourceExhausted { bytes: usize },

    /// The requested bitmap size is zero or too large to address.
    #[error("Invalid bitmap dimensions {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The tile carries no data token, or one of the wrong type.
    #[error("Tile ({column}, {row}) has no usable data for this provider")]
    MissingData { column: u32, row: u32 },

    /// The tile image does not exist.
    #[error("Tile image not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Reading the tile image failed.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The tile image could not be decoded.
    #[error("Failed to decode {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The decode routine panicked on a worker thread.
    #[error("Decode task panicked: {0}")]
    Panicked(String),

    /// Provider-specific failure.
    #[error("Provider error: {0}")]
    Provider(String),
}

impl DecodeError {
    /// True for failures caused by running out of memory.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, DecodeError::ResourceExhausted { .. })
    }

    /// Classify an `image` crate error for `path`.
    pub fn from_image(path: PathBuf, err: image::ImageError) -> Self {
        use image::error::LimitErrorKind;

        match err {
            image::ImageError::IoError(source) if source.kind() == io::ErrorKind::NotFound => {
                DecodeError::NotFound(path)
            }
            image::ImageError::IoError(source) => DecodeError::Io { path, source },
            image::ImageError::Limits(ref limit)
                if matches!(limit.kind(), LimitErrorKind::InsufficientMemory) =>
            {
                DecodeError::ResourceExhausted { bytes: 0 }
            }
            other => DecodeError::Image {
                path,
                source: other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_exhaustion_classification() {
        assert!(DecodeError::ResourceExhausted { bytes: 1024 }.is_resource_exhaustion());
        assert!(!DecodeError::Provider("boom".to_string()).is_resource_exhaustion());
        assert!(!DecodeError::NotFound(PathBuf::from("a.png")).is_resource_exhaustion());
    }

    #[test]
    fn test_not_found_from_image_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err = DecodeError::from_image(PathBuf::from("tiles/0_0.png"), io_err.into());
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[test]
    fn test_other_io_error_from_image_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = DecodeError::from_image(PathBuf::from("tiles/0_0.png"), io_err.into());
        assert!(matches!(err, DecodeError::Io { .. }));
    }

    #[test]
    fn test_display() {
        let err = DecodeError::InvalidDimensions {
            width: 0,
            height: 256,
        };
        assert_eq!(err.to_string(), "Invalid bitmap dimensions 0×256");

        let err = DecodeError::MissingData { column: 3, row: 4 };
        assert_eq!(
            err.to_string(),
            "Tile (3, 4) has no usable data for this provider"
        );
    }
}
