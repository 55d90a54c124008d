//! Tile lifecycle states.

use std::fmt;

/// Lifecycle state of a tile.
///
/// ```text
/// Unassigned --[queued]--> PendingDecode --[bitmap installed]--> Decoded
///      *     --[destroy]--> Destroyed
/// ```
///
/// `Destroyed` is terminal. A bitmap exists only in `Decoded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileState {
    /// Created by a detail level, never queued.
    #[default]
    Unassigned,
    /// Queued for decode, no bitmap yet.
    PendingDecode,
    /// Bitmap installed.
    Decoded,
    /// Evicted or torn down.
    Destroyed,
}

impl TileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileState::Unassigned => "unassigned",
            TileState::PendingDecode => "pending",
            TileState::Decoded => "decoded",
            TileState::Destroyed => "destroyed",
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, TileState::Destroyed)
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
