//! Detail levels: the oracle deciding which tiles are visible.
//!
//! A [`DetailLevel`] owns one grid of tiles at a fixed scale. When the
//! viewport moves, the canvas asks it to recompute its visible set
//! ([`DetailLevel::compute_current_state`]) and then reads that set back
//! ([`DetailLevel::visible_tiles`]).
//!
//! Levels are compared by [`LevelId`] rather than by pointer, so two level
//! objects describing the same grid are the same level to the canvas.

mod grid;

pub use grid::{GridDetailLevel, TileRange};

use crate::tile::{LevelScale, SharedTile};
use std::collections::HashSet;
use std::fmt;

/// Value identity of a detail level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelId {
    pub scale: LevelScale,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl LevelId {
    pub fn new(scale: f32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            scale: LevelScale::new(scale),
            tile_width,
            tile_height,
        }
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}x{}",
            self.scale, self.tile_width, self.tile_height
        )
    }
}

/// Source of visible tiles for one scale.
///
/// Implementations are shared with the canvas as `Arc<dyn DetailLevel>` and
/// must be thread-safe; their state is normally updated from the host's
/// viewport notifications.
pub trait DetailLevel: Send + Sync {
    /// Scale of this level relative to the full-resolution image.
    fn scale(&self) -> f32;

    /// Identity used to compare levels.
    fn level_id(&self) -> LevelId;

    /// Recompute the visible tile set from the current viewport.
    ///
    /// Returns true if the set changed since the previous computation.
    fn compute_current_state(&self) -> bool;

    /// The tiles found visible by the last computation.
    fn visible_tiles(&self) -> HashSet<SharedTile>;
}

impl fmt::Debug for dyn DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailLevel")
            .field("id", &self.level_id())
            .finish()
    }
}
