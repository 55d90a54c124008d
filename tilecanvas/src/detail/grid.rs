//! Regular grid detail level.

use super::{DetailLevel, LevelId};
use crate::geom::PixelRect;
use crate::tile::{SharedTile, Tile, TileData};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// Half-open range of grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileRange {
    pub column_start: u32,
    pub column_end: u32,
    pub row_start: u32,
    pub row_end: u32,
}

impl TileRange {
    pub fn is_empty(&self) -> bool {
        self.column_start >= self.column_end || self.row_start >= self.row_end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.column_end - self.column_start) * (self.row_end - self.row_start)) as usize
    }

    /// Every `(column, row)` in the range, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.row_start..self.row_end)
            .flat_map(move |row| (self.column_start..self.column_end).map(move |col| (col, row)))
    }
}

#[derive(Debug, Default)]
struct GridState {
    viewport: PixelRect,
    range: Option<TileRange>,
    visible: HashSet<SharedTile>,
}

/// Detail level laid out as a regular grid over a full-resolution image.
///
/// The viewport is given in full-resolution pixels. At scale `s` the level's
/// grid covers `image_size * s` native pixels, split into tiles of
/// `tile_width × tile_height`.
///
/// # Example
///
/// ```
/// use tilecanvas::detail::{DetailLevel, GridDetailLevel};
/// use tilecanvas::geom::PixelRect;
///
/// let level = GridDetailLevel::new(0.5, 256, 256, 4096, 4096);
/// level.set_viewport(PixelRect::new(0, 0, 1024, 512));
///
/// assert!(level.compute_current_state());
/// assert_eq!(level.visible_tiles().len(), 2);
/// assert!(!level.compute_current_state());
/// ```
pub struct GridDetailLevel {
    scale: f32,
    tile_width: u32,
    tile_height: u32,
    image_width: u32,
    image_height: u32,
    data: Option<TileData>,
    state: Mutex<GridState>,
}

impl GridDetailLevel {
    pub fn new(
        scale: f32,
        tile_width: u32,
        tile_height: u32,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self {
            scale,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
            image_width,
            image_height,
            data: None,
            state: Mutex::new(GridState::default()),
        }
    }

    /// Data token attached to every tile of this level.
    pub fn with_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Number of columns and rows in this level's grid.
    pub fn grid_size(&self) -> (u32, u32) {
        let width = (self.image_width as f64 * self.scale as f64).ceil() as u32;
        let height = (self.image_height as f64 * self.scale as f64).ceil() as u32;
        (
            width.div_ceil(self.tile_width),
            height.div_ceil(self.tile_height),
        )
    }

    /// Update the viewport, in full-resolution pixels.
    ///
    /// Takes effect on the next [`DetailLevel::compute_current_state`].
    pub fn set_viewport(&self, viewport: PixelRect) {
        self.state.lock().viewport = viewport;
    }

    pub fn viewport(&self) -> PixelRect {
        self.state.lock().viewport
    }

    /// Grid cells intersecting `viewport`.
    pub fn range_for(&self, viewport: PixelRect) -> TileRange {
        let (columns, rows) = self.grid_size();
        let native = viewport.scaled(self.scale);
        if native.is_empty() || native.right <= 0 || native.bottom <= 0 {
            return TileRange::default();
        }

        let tw = self.tile_width as i64;
        let th = self.tile_height as i64;
        let clamp = |v: i64, max: u32| v.clamp(0, max as i64) as u32;

        TileRange {
            column_start: clamp(native.left.max(0) as i64 / tw, columns),
            column_end: clamp((native.right as i64 + tw - 1) / tw, columns),
            row_start: clamp(native.top.max(0) as i64 / th, rows),
            row_end: clamp((native.bottom as i64 + th - 1) / th, rows),
        }
    }

    fn make_tile(&self, column: u32, row: u32) -> SharedTile {
        let tile = Tile::new(column, row, self.tile_width, self.tile_height, self.scale);
        Arc::new(match &self.data {
            Some(data) => tile.with_shared_data(Arc::clone(data)),
            None => tile,
        })
    }
}

impl DetailLevel for GridDetailLevel {
    fn scale(&self) -> f32 {
        self.scale
    }

    fn level_id(&self) -> LevelId {
        LevelId::new(self.scale, self.tile_width, self.tile_height)
    }

    fn compute_current_state(&self) -> bool {
        let mut state = self.state.lock();
        let range = self.range_for(state.viewport);
        // A set holding destroyed tiles is rebuilt with fresh instances
        let stale = state.visible.iter().any(|tile| tile.state().is_destroyed());
        if state.range == Some(range) && !stale {
            return false;
        }

        trace!(
            scale = self.scale,
            columns = ?(range.column_start..range.column_end),
            rows = ?(range.row_start..range.row_end),
            "Visible tile range changed"
        );
        state.visible = range
            .cells()
            .map(|(column, row)| self.make_tile(column, row))
            .collect();
        state.range = Some(range);
        true
    }

    fn visible_tiles(&self) -> HashSet<SharedTile> {
        self.state.lock().visible.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TilePattern;

    fn keys(level: &GridDetailLevel) -> Vec<(u32, u32)> {
        let mut keys: Vec<_> = level
            .visible_tiles()
            .iter()
            .map(|t| (t.column(), t.row()))
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_grid_size_rounds_up() {
        let level = GridDetailLevel::new(1.0, 256, 256, 1000, 600);
        assert_eq!(level.grid_size(), (4, 3));

        let level = GridDetailLevel::new(0.25, 256, 256, 1000, 600);
        assert_eq!(level.grid_size(), (1, 1));
    }

    #[test]
    fn test_visible_tiles_follow_viewport() {
        let level = GridDetailLevel::new(1.0, 100, 100, 1000, 1000);
        level.set_viewport(PixelRect::new(50, 50, 150, 120));

        assert!(level.compute_current_state());
        assert_eq!(keys(&level), vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_unchanged_viewport_reports_no_change() {
        let level = GridDetailLevel::new(1.0, 100, 100, 1000, 1000);
        level.set_viewport(PixelRect::new(0, 0, 100, 100));
        assert!(level.compute_current_state());

        // Moving within the same cells does not change the set
        level.set_viewport(PixelRect::new(10, 10, 90, 90));
        assert!(!level.compute_current_state());

        level.set_viewport(PixelRect::new(150, 0, 250, 100));
        assert!(level.compute_current_state());
        assert_eq!(keys(&level), vec![(1, 0), (2, 0)]);
    }

    #[test]
    fn test_destroyed_tiles_are_replaced() {
        let level = GridDetailLevel::new(1.0, 100, 100, 1000, 1000);
        level.set_viewport(PixelRect::new(0, 0, 100, 100));
        level.compute_current_state();

        let old = level.visible_tiles().into_iter().next().unwrap();
        old.destroy(true);

        assert!(level.compute_current_state());
        let fresh = level.visible_tiles().into_iter().next().unwrap();
        assert_eq!(fresh, old);
        assert!(!Arc::ptr_eq(&fresh, &old));
        assert!(!fresh.state().is_destroyed());
    }

    #[test]
    fn test_range_clamped_to_grid() {
        let level = GridDetailLevel::new(1.0, 100, 100, 300, 300);
        let range = level.range_for(PixelRect::new(-50, -50, 5000, 5000));
        assert_eq!(
            range,
            TileRange {
                column_start: 0,
                column_end: 3,
                row_start: 0,
                row_end: 3
            }
        );
        assert_eq!(range.len(), 9);

        assert!(level.range_for(PixelRect::new(-100, -100, -10, -10)).is_empty());
    }

    #[test]
    fn test_scale_applied_to_viewport() {
        let level = GridDetailLevel::new(0.5, 256, 256, 4096, 4096);
        let range = level.range_for(PixelRect::new(512, 0, 1536, 512));
        assert_eq!((range.column_start, range.column_end), (1, 3));
        assert_eq!((range.row_start, range.row_end), (0, 1));
    }

    #[test]
    fn test_tiles_carry_level_data() {
        let level = GridDetailLevel::new(1.0, 64, 64, 128, 128)
            .with_data(TilePattern::new("{col}_{row}.png"));
        level.set_viewport(PixelRect::new(0, 0, 64, 64));
        level.compute_current_state();

        let tile = level.visible_tiles().into_iter().next().unwrap();
        assert_eq!(tile.data::<TilePattern>().unwrap().resolve(0, 0), "0_0.png");
        assert_eq!(tile.scale(), 1.0);
    }

    #[test]
    fn test_level_id_is_value_identity() {
        let a = GridDetailLevel::new(0.5, 256, 256, 100, 100);
        let b = GridDetailLevel::new(0.5, 256, 256, 9999, 9999);
        let c = GridDetailLevel::new(1.0, 256, 256, 100, 100);
        assert_eq!(a.level_id(), b.level_id());
        assert_ne!(a.level_id(), c.level_id());
    }
}
