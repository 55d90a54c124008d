//! Retained `tiny-skia` pixmap surface.

use super::Surface;
use crate::bitmap::Bitmap;
use crate::geom::PixelRect;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tiny_skia::{BlendMode, Color, IntRect, Pixmap, PixmapPaint, Transform};
use tracing::{trace, warn};

/// Errors from pixmap surfaces.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Invalid surface dimensions {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Failed to encode PNG: {0}")]
    Encode(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Pixels covered by a fading draw, saved before its first pass.
#[derive(Debug, Clone)]
struct Underlay {
    origin: (i32, i32),
    pixels: Pixmap,
}

/// An in-memory surface backed by a `tiny_skia::Pixmap`.
///
/// The clip defaults to the whole pixmap and can be narrowed to emulate a
/// scrolled viewport.
///
/// Partial-opacity draws are not cumulative: the first one to a destination
/// saves the pixels beneath it, and each later pass to the same destination
/// restores them before compositing. A full-opacity draw releases the saved
/// pixels.
#[derive(Debug, Clone)]
pub struct PixmapSurface {
    pixmap: Pixmap,
    clip: PixelRect,
    underlays: HashMap<PixelRect, Underlay>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(SurfaceError::InvalidDimensions { width, height })?;
        Ok(Self {
            pixmap,
            clip: PixelRect::from_size(width as i32, height as i32),
            underlays: HashMap::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Restrict drawing to `clip`, intersected with the pixmap bounds.
    pub fn set_clip(&mut self, clip: PixelRect) {
        let bounds = PixelRect::from_size(self.width() as i32, self.height() as i32);
        self.clip = clip.intersection(&bounds).unwrap_or_default();
    }

    pub fn clip(&self) -> PixelRect {
        self.clip
    }

    /// Fill the whole surface, discarding pixels saved under fading draws.
    pub fn fill(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.pixmap.fill(Color::from_rgba8(r, g, b, a));
        self.underlays.clear();
    }

    /// Number of destinations with a fade in progress.
    pub fn pending_fades(&self) -> usize {
        self.underlays.len()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Copy out the clipped region.
    pub fn snapshot_clip(&self) -> Option<Pixmap> {
        let rect = IntRect::from_ltrb(
            self.clip.left,
            self.clip.top,
            self.clip.right,
            self.clip.bottom,
        )?;
        self.pixmap.clone_rect(rect)
    }

    /// Put back the pixels saved under `dst`, or save them on the first pass.
    fn prepare_destination(&mut self, dst: PixelRect, fading: bool) {
        if let Some(underlay) = self.underlays.get(&dst) {
            let paint = PixmapPaint {
                blend_mode: BlendMode::Source,
                ..PixmapPaint::default()
            };
            let (x, y) = underlay.origin;
            self.pixmap.draw_pixmap(
                x,
                y,
                underlay.pixels.as_ref(),
                &paint,
                Transform::identity(),
                None,
            );
            if !fading {
                self.underlays.remove(&dst);
            }
            return;
        }
        if !fading {
            return;
        }

        let bounds = PixelRect::from_size(self.width() as i32, self.height() as i32);
        let saved = dst.intersection(&bounds).and_then(|area| {
            let rect = IntRect::from_ltrb(area.left, area.top, area.right, area.bottom)?;
            let pixels = self.pixmap.clone_rect(rect)?;
            Some(Underlay {
                origin: (area.left, area.top),
                pixels,
            })
        });
        if let Some(underlay) = saved {
            trace!(dst = %dst, "Saved pixels under fading draw");
            self.underlays.insert(dst, underlay);
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, SurfaceError> {
        self.pixmap
            .encode_png()
            .map_err(|e| SurfaceError::Encode(e.to_string()))
    }

    pub fn save_png(&self, path: &Path) -> Result<(), SurfaceError> {
        let data = self.encode_png()?;
        std::fs::write(path, data).map_err(|source| SurfaceError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

impl Surface for PixmapSurface {
    fn clip_bounds(&self) -> PixelRect {
        self.clip
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, src: PixelRect, dst: PixelRect, opacity: f32) {
        if src.is_empty() || dst.is_empty() {
            return;
        }

        let full = PixelRect::from_size(bitmap.width() as i32, bitmap.height() as i32);
        let cropped;
        let source = if src == full {
            bitmap.pixmap().as_ref()
        } else {
            let Some(region) = IntRect::from_ltrb(src.left, src.top, src.right, src.bottom)
                .and_then(|rect| bitmap.pixmap().clone_rect(rect))
            else {
                warn!(src = %src, "Source rectangle outside bitmap, skipping draw");
                return;
            };
            cropped = region;
            cropped.as_ref()
        };

        let sx = dst.width() as f32 / src.width() as f32;
        let sy = dst.height() as f32 / src.height() as f32;
        let transform = Transform::from_row(sx, 0.0, 0.0, sy, dst.left as f32, dst.top as f32);

        let opacity = opacity.clamp(0.0, 1.0);
        self.prepare_destination(dst, opacity < 1.0);

        let paint = PixmapPaint {
            opacity,
            ..PixmapPaint::default()
        };

        // TODO: pass self.clip as a tiny_skia::Mask once partial-viewport
        // redraws need pixel-exact clipping.
        self.pixmap.draw_pixmap(0, 0, source, &paint, transform, None);
    }
}
