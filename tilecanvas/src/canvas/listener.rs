//! Render lifecycle notifications.

use crate::provider::DecodeError;
use crate::tile::Tile;

/// Observer of render batches.
///
/// All methods are called on the owning thread while events are dispatched.
pub trait TileRenderListener {
    /// A decode batch was queued.
    fn on_render_start(&mut self);

    /// The running batch was cancelled or aborted.
    fn on_render_cancelled(&mut self);

    /// Every tile of the batch finished decoding.
    fn on_render_complete(&mut self);

    /// A single tile failed to decode. It is retried on a later cycle.
    fn on_tile_decode_failed(&mut self, _tile: &Tile, _error: &DecodeError) {}
}
