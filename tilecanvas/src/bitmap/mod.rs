//! Decoded tile pixels and buffer recycling.
//!
//! A [`Bitmap`] is a premultiplied RGBA8 buffer backed by a `tiny_skia`
//! [`Pixmap`], so it can be composited directly onto a pixmap surface.
//! Buffers released by destroyed tiles are handed to a [`BitmapPool`] and
//! reused by later decodes of the same dimensions.

mod pool;

pub use pool::{BitmapPool, PoolStats, DEFAULT_POOL_CAPACITY_BYTES};

use crate::provider::DecodeError;
use std::fmt;
use tiny_skia::{Color, ColorU8, IntSize, Pixmap};

/// Bytes per pixel (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// A decoded tile bitmap.
#[derive(Clone, PartialEq)]
pub struct Bitmap {
    pixmap: Pixmap,
}

impl Bitmap {
    /// Allocate a transparent bitmap.
    ///
    /// Allocation failure is reported as [`DecodeError::ResourceExhausted`]
    /// instead of aborting the process.
    pub fn new(width: u32, height: u32) -> Result<Self, DecodeError> {
        let len = buffer_len(width, height)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| DecodeError::ResourceExhausted { bytes: len })?;
        data.resize(len, 0);
        Self::from_buffer(data, width, height)
    }

    /// Wrap an existing buffer of exactly `width * height * 4` bytes.
    pub fn from_buffer(data: Vec<u8>, width: u32, height: u32) -> Result<Self, DecodeError> {
        let size = IntSize::from_wh(width, height)
            .ok_or(DecodeError::InvalidDimensions { width, height })?;
        Pixmap::from_vec(data, size)
            .map(Self::from_pixmap)
            .ok_or(DecodeError::InvalidDimensions { width, height })
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixmap.data().len()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Fill every pixel with an unpremultiplied RGBA color.
    pub fn fill_rgba(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.pixmap.fill(Color::from_rgba8(r, g, b, a));
    }

    /// Copy unpremultiplied RGBA8 pixels into the bitmap, row-major.
    ///
    /// Copies as many whole pixels as both buffers hold.
    pub fn copy_from_rgba8(&mut self, rgba: &[u8]) {
        for (dst, src) in self
            .pixmap
            .pixels_mut()
            .iter_mut()
            .zip(rgba.chunks_exact(BYTES_PER_PIXEL))
        {
            *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
        }
    }

    /// Give up the pixel buffer for reuse.
    pub fn into_buffer(self) -> Vec<u8> {
        self.pixmap.take()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

fn buffer_len(width: u32, height: u32) -> Result<usize, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
        .ok_or(DecodeError::InvalidDimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bitmap_is_transparent() {
        let bitmap = Bitmap::new(4, 2).unwrap();
        assert_eq!(bitmap.width(), 4);
        assert_eq!(bitmap.height(), 2);
        assert_eq!(bitmap.byte_len(), 32);
        assert!(bitmap.pixmap().data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            Bitmap::new(0, 10),
            Err(DecodeError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_from_buffer_requires_exact_length() {
        assert!(Bitmap::from_buffer(vec![0; 16], 2, 2).is_ok());
        assert!(Bitmap::from_buffer(vec![0; 15], 2, 2).is_err());
    }

    #[test]
    fn test_copy_from_rgba8_premultiplies() {
        let mut bitmap = Bitmap::new(1, 1).unwrap();
        bitmap.copy_from_rgba8(&[255, 0, 0, 128]);

        let pixel = bitmap.pixmap().pixel(0, 0).unwrap();
        assert_eq!(pixel.alpha(), 128);
        assert_eq!(pixel.red(), 128);
    }

    #[test]
    fn test_into_buffer_returns_storage() {
        let bitmap = Bitmap::new(3, 3).unwrap();
        assert_eq!(bitmap.into_buffer().len(), 36);
    }
}
