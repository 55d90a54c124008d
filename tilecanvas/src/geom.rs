//! Integer pixel rectangles and scale conversions.
//!
//! Tile geometry is expressed in integer pixels. Two coordinate spaces are in
//! play:
//!
//! - **native** space: pixels of the detail level's own grid, where tile
//!   `(column, row)` starts at `(column * width, row * height)`
//! - **tile** (scaled) space: native pixels divided by the detail level scale,
//!   i.e. positions relative to the full-resolution image
//!
//! Conversions round half up, so `unscale(5, 2.0) == 3`.

use std::fmt;

/// Multiply an integer coordinate by `scale`, rounding half up.
#[inline]
pub fn scale(value: i32, scale: f32) -> i32 {
    (value as f32 * scale + 0.5).floor() as i32
}

/// Divide an integer coordinate by `scale`, rounding half up.
#[inline]
pub fn unscale(value: i32, scale: f32) -> i32 {
    (value as f32 / scale + 0.5).floor() as i32
}

/// Axis-aligned rectangle in integer pixels.
///
/// `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    /// Create a rectangle from its four edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rectangle anchored at the origin.
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Create a rectangle from an origin and a size.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// True when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// True when the two rectangles share at least one pixel.
    ///
    /// Touching edges do not count as an intersection.
    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// True when `other` lies entirely within this rectangle.
    pub fn contains(&self, other: &PixelRect) -> bool {
        !self.is_empty()
            && self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// The overlapping region of two rectangles, if any.
    pub fn intersection(&self, other: &PixelRect) -> Option<PixelRect> {
        if !self.intersects(other) {
            return None;
        }
        Some(PixelRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        ))
    }

    /// Move the rectangle by `(dx, dy)`.
    pub fn offset(&self, dx: i32, dy: i32) -> PixelRect {
        PixelRect::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Multiply every edge by `factor`.
    pub fn scaled(&self, factor: f32) -> PixelRect {
        PixelRect::new(
            scale(self.left, factor),
            scale(self.top, factor),
            scale(self.right, factor),
            scale(self.bottom, factor),
        )
    }

    /// Divide every edge by `factor`.
    pub fn unscaled(&self, factor: f32) -> PixelRect {
        PixelRect::new(
            unscale(self.left, factor),
            unscale(self.top, factor),
            unscale(self.right, factor),
            unscale(self.bottom, factor),
        )
    }
}

impl fmt::Display for PixelRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscale_rounds_half_up() {
        assert_eq!(unscale(5, 2.0), 3);
        assert_eq!(unscale(4, 2.0), 2);
        assert_eq!(unscale(256, 0.5), 512);
        assert_eq!(unscale(100, 3.0), 33);
    }

    #[test]
    fn test_scale_rounds_half_up() {
        assert_eq!(scale(3, 0.5), 2);
        assert_eq!(scale(512, 0.5), 256);
    }

    #[test]
    fn test_intersects_excludes_touching_edges() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(10, 0, 20, 10);
        let c = PixelRect::new(9, 9, 20, 20);

        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(c.intersects(&a));
    }

    #[test]
    fn test_contains() {
        let outer = PixelRect::new(0, 0, 100, 100);
        assert!(outer.contains(&PixelRect::new(10, 10, 20, 20)));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&PixelRect::new(90, 90, 110, 100)));
    }

    #[test]
    fn test_intersection() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(5, 5, 15, 15);
        assert_eq!(a.intersection(&b), Some(PixelRect::new(5, 5, 10, 10)));
        assert_eq!(a.intersection(&PixelRect::new(20, 20, 30, 30)), None);
    }

    #[test]
    fn test_unscaled_rect() {
        let native = PixelRect::new(256, 0, 512, 256);
        assert_eq!(native.unscaled(0.5), PixelRect::new(512, 0, 1024, 512));
    }

    #[test]
    fn test_display() {
        assert_eq!(PixelRect::new(1, 2, 3, 4).to_string(), "[1,2][3,4]");
    }
}
