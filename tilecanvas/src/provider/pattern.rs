//! Synthetic checkerboard provider.

use super::{BitmapProvider, DecodeContext, DecodeError};
use crate::bitmap::Bitmap;
use crate::tile::Tile;
use tiny_skia::{Paint, Rect, Transform};

const LIGHT: [u8; 3] = [0xd8, 0xdc, 0xe0];
const DARK: [u8; 3] = [0x5a, 0x6a, 0x7a];
const BORDER: [u8; 3] = [0x20, 0x20, 0x20];

/// Generates a checkerboard of solid tiles with a thin border.
///
/// Colors alternate by grid parity and are tinted by detail level scale so
/// that different levels are distinguishable.
#[derive(Debug, Clone)]
pub struct PatternBitmapProvider {
    border: u32,
}

impl PatternBitmapProvider {
    pub fn new() -> Self {
        Self { border: 1 }
    }

    /// Border width in pixels (0 disables the border).
    pub fn with_border(mut self, border: u32) -> Self {
        self.border = border;
        self
    }

    /// Base color for a tile, before the border is drawn.
    pub fn color_for(&self, tile: &Tile) -> [u8; 3] {
        let base = if (tile.column() + tile.row()) % 2 == 0 {
            LIGHT
        } else {
            DARK
        };
        let tint = (tile.scale().clamp(0.0, 1.0) * 40.0) as u8;
        [base[0].saturating_sub(tint), base[1], base[2].saturating_add(tint)]
    }
}

impl Default for PatternBitmapProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmapProvider for PatternBitmapProvider {
    fn decode(&self, tile: &Tile, context: &DecodeContext) -> Result<Bitmap, DecodeError> {
        let mut bitmap = context.allocate(tile.width(), tile.height())?;
        let [r, g, b] = self.color_for(tile);
        bitmap.fill_rgba(r, g, b, 255);

        if self.border > 0 {
            let (w, h) = (tile.width() as f32, tile.height() as f32);
            let t = self.border as f32;
            let mut paint = Paint::default();
            paint.set_color_rgba8(BORDER[0], BORDER[1], BORDER[2], 255);

            let edges = [
                Rect::from_xywh(0.0, 0.0, w, t),
                Rect::from_xywh(0.0, h - t, w, t),
                Rect::from_xywh(0.0, 0.0, t, h),
                Rect::from_xywh(w - t, 0.0, t, h),
            ];
            for edge in edges.into_iter().flatten() {
                bitmap
                    .pixmap_mut()
                    .fill_rect(edge, &paint, Transform::identity(), None);
            }
        }

        Ok(bitmap)
    }
}
