//! Tile set bookkeeping for the canvas.
//!
//! Five sets track every tile the canvas knows about:
//!
//! | Set | Meaning |
//! |-----|---------|
//! | in-viewport | Tiles the current detail level reports visible |
//! | evicted | Tiles that left the viewport this cycle (drained each cycle) |
//! | already-rendered | Tiles composited at full opacity |
//! | to-be-rendered | This cycle's decode queue |
//! | ready-to-draw | Decoded tiles awaiting compositing |
//!
//! A tile is never in both ready-to-draw and already-rendered, and every
//! ready-to-draw tile is in-viewport. Inserting into a set never replaces an
//! equal element, so the first instance admitted to in-viewport is the one
//! that persists across cycles.

use crate::geom::PixelRect;
use crate::tile::{SharedTile, Tile};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of validating a decode result against the sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The result may be installed and drawn.
    Admitted,
    /// The tile left the viewport.
    NotInViewport,
    /// An equal tile is in-viewport, but it is a different instance.
    Superseded,
    /// The tile was already composited.
    AlreadyRendered,
    /// The tile is already waiting to be drawn.
    AlreadyReady,
}

#[derive(Debug, Default)]
pub struct TileSets {
    in_viewport: HashSet<SharedTile>,
    evicted: HashSet<SharedTile>,
    already_rendered: HashSet<SharedTile>,
    to_be_rendered: HashSet<SharedTile>,
    ready_to_draw: HashSet<SharedTile>,
}

impl TileSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_viewport(&self) -> &HashSet<SharedTile> {
        &self.in_viewport
    }

    pub fn already_rendered(&self) -> &HashSet<SharedTile> {
        &self.already_rendered
    }

    pub fn to_be_rendered(&self) -> &HashSet<SharedTile> {
        &self.to_be_rendered
    }

    pub fn ready_to_draw(&self) -> &HashSet<SharedTile> {
        &self.ready_to_draw
    }

    /// The in-viewport instance equal to `tile`, if any.
    pub fn viewport_member(&self, tile: &Tile) -> Option<&SharedTile> {
        self.in_viewport.get(tile)
    }

    /// Replace the viewport with `visible`.
    ///
    /// Tiles no longer visible are removed from every set and returned so the
    /// caller can destroy them. Tiles still visible keep their existing
    /// instance.
    pub fn apply_visible(&mut self, visible: HashSet<SharedTile>) -> Vec<SharedTile> {
        for tile in &self.in_viewport {
            if !visible.contains(tile) {
                self.evicted.insert(Arc::clone(tile));
            }
        }
        for tile in visible {
            self.in_viewport.insert(tile);
        }
        for tile in &self.evicted {
            self.in_viewport.remove(tile);
            self.already_rendered.remove(tile);
            self.ready_to_draw.remove(tile);
            self.to_be_rendered.remove(tile);
        }
        self.evicted.drain().collect()
    }

    /// Compute this cycle's decode queue: in-viewport minus already-rendered.
    pub fn plan_decode(&mut self) -> Vec<SharedTile> {
        self.to_be_rendered = self
            .in_viewport
            .difference(&self.already_rendered)
            .cloned()
            .collect();
        self.to_be_rendered.iter().cloned().collect()
    }

    /// Check whether a decoded `tile` may become ready to draw.
    pub fn admission(&self, tile: &SharedTile) -> Admission {
        match self.in_viewport.get(tile.as_ref()) {
            Some(member) if Arc::ptr_eq(member, tile) => {}
            Some(_) => return Admission::Superseded,
            None => return Admission::NotInViewport,
        }
        if self.already_rendered.contains(tile.as_ref()) {
            return Admission::AlreadyRendered;
        }
        if self.ready_to_draw.contains(tile.as_ref()) {
            return Admission::AlreadyReady;
        }
        Admission::Admitted
    }

    /// Move an admitted tile from the decode queue to ready-to-draw.
    pub fn insert_ready(&mut self, tile: SharedTile) -> bool {
        self.to_be_rendered.remove(&tile);
        self.ready_to_draw.insert(tile)
    }

    /// Take a tile off the decode queue without admitting it.
    pub fn remove_queued(&mut self, tile: &Tile) {
        self.to_be_rendered.remove(tile);
    }

    /// Draw every ready tile intersecting `clip` (in tile space).
    ///
    /// Tiles whose draw reports them clean move to already-rendered. Returns
    /// true if any drawn tile still needs redrawing.
    pub fn composite(&mut self, clip: PixelRect, mut draw: impl FnMut(&Tile) -> bool) -> bool {
        let mut finished = Vec::new();
        let mut dirty = false;

        for tile in &self.ready_to_draw {
            if !tile.scaled_rect().intersects(&clip) {
                continue;
            }
            if draw(tile) {
                dirty = true;
            } else {
                finished.push(Arc::clone(tile));
            }
        }

        for tile in finished {
            self.ready_to_draw.remove(&tile);
            self.already_rendered.insert(tile);
        }
        dirty
    }

    /// Empty every set, returning each distinct tile once.
    pub fn drain_all(&mut self) -> Vec<SharedTile> {
        let mut all: HashSet<SharedTile> = self.in_viewport.drain().collect();
        all.extend(self.already_rendered.drain());
        all.extend(self.ready_to_draw.drain());
        all.extend(self.to_be_rendered.drain());
        all.extend(self.evicted.drain());
        all.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.in_viewport.is_empty()
            && self.already_rendered.is_empty()
            && self.ready_to_draw.is_empty()
            && self.to_be_rendered.is_empty()
    }
}
