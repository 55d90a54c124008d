//! Compositing surfaces.
//!
//! A [`Surface`] is the host-provided drawing target. Surfaces are retained:
//! pixels composited during earlier passes stay in place, so the canvas only
//! draws tiles that are new or still fading in.
//!
//! [`ScaledSurface`] applies the canvas scale, letting tiles draw in tile
//! space while the host surface works in display pixels.

mod pixmap;

pub use pixmap::{PixmapSurface, SurfaceError};

use crate::bitmap::Bitmap;
use crate::geom::PixelRect;

/// Drawing target for tile bitmaps.
pub trait Surface {
    /// Region that is currently visible, in this surface's pixels.
    fn clip_bounds(&self) -> PixelRect;

    /// Draw the `src` region of `bitmap` into `dst` with the given opacity.
    ///
    /// `opacity` is the tile's absolute opacity for this pass. A fading tile
    /// is drawn to the same `dst` on every pass with a rising opacity, so a
    /// retained surface must not let those passes stack: compositing each one
    /// source-over onto the previous result would reach full coverage well
    /// before the fade ends. [`PixmapSurface`] restores the pixels under
    /// `dst` before every partial-opacity pass.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, src: PixelRect, dst: PixelRect, opacity: f32);
}

/// Wraps a surface so that callers draw in coordinates divided by `scale`.
pub struct ScaledSurface<'a, S: Surface + ?Sized> {
    inner: &'a mut S,
    scale: f32,
}

impl<'a, S: Surface + ?Sized> ScaledSurface<'a, S> {
    pub fn new(inner: &'a mut S, scale: f32) -> Self {
        Self { inner, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

impl<S: Surface + ?Sized> Surface for ScaledSurface<'_, S> {
    fn clip_bounds(&self) -> PixelRect {
        self.inner.clip_bounds().unscaled(self.scale)
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, src: PixelRect, dst: PixelRect, opacity: f32) {
        self.inner
            .draw_bitmap(bitmap, src, dst.scaled(self.scale), opacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSurface {
        clip: PixelRect,
        draws: Vec<PixelRect>,
    }

    impl Surface for RecordingSurface {
        fn clip_bounds(&self) -> PixelRect {
            self.clip
        }

        fn draw_bitmap(&mut self, _bitmap: &Bitmap, _src: PixelRect, dst: PixelRect, _opacity: f32) {
            self.draws.push(dst);
        }
    }

    #[test]
    fn test_scaled_surface_converts_both_ways() {
        let mut recording = RecordingSurface {
            clip: PixelRect::new(0, 0, 100, 50),
            draws: Vec::new(),
        };
        let mut scaled = ScaledSurface::new(&mut recording, 0.5);

        assert_eq!(scaled.clip_bounds(), PixelRect::new(0, 0, 200, 100));

        let bitmap = Bitmap::new(1, 1).unwrap();
        scaled.draw_bitmap(
            &bitmap,
            PixelRect::new(0, 0, 1, 1),
            PixelRect::new(200, 0, 400, 200),
            1.0,
        );
        assert_eq!(recording.draws, vec![PixelRect::new(100, 0, 200, 100)]);
    }
}
