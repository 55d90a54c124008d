//! TileCanvas - Viewport-driven tile cache and render scheduler
//!
//! This library decides which tiles of a detail level to decode, decodes them
//! on a cancellable worker pool, and composites them onto a drawing surface
//! with a short fade-in. Work that becomes irrelevant because the viewport
//! moved or the level changed is discarded rather than drawn.
//!
//! # High-Level API
//!
//! The [`canvas`] module provides the coordinator:
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tilecanvas::{CanvasConfig, GridDetailLevel, PatternBitmapProvider, PixelRect, TileCanvas};
//! use tilecanvas::surface::PixmapSurface;
//!
//! let config = CanvasConfig::default().with_render_buffer(Duration::ZERO);
//! let mut canvas = TileCanvas::new(config, Arc::new(PatternBitmapProvider::new())).unwrap();
//!
//! let level = Arc::new(GridDetailLevel::new(1.0, 64, 64, 256, 256));
//! level.set_viewport(PixelRect::new(0, 0, 128, 128));
//! canvas.set_detail_level(level);
//! canvas.request_render();
//!
//! assert!(canvas.run_until_idle(Duration::from_secs(5)));
//! let mut surface = PixmapSurface::new(128, 128).unwrap();
//! canvas.draw_tiles(&mut surface);
//! ```
//!
//! # Modules
//!
//! - [`tile`] - Tile identity, decode state and fade-in
//! - [`detail`] - Detail levels reporting the visible tile set
//! - [`provider`] - Bitmap providers decoding tiles
//! - [`executor`] - Cancellable decode pool
//! - [`canvas`] - Tile set coordination and compositing
//! - [`surface`] - Drawing targets
//! - [`config`] - Runtime and file configuration
//! - [`logging`] - Tracing subscriber setup

pub mod bitmap;
pub mod canvas;
pub mod config;
pub mod detail;
pub mod error;
pub mod executor;
pub mod geom;
pub mod logging;
pub mod provider;
pub mod surface;
pub mod tile;

pub use bitmap::{Bitmap, BitmapPool};
pub use canvas::{TileCanvas, TileRenderListener};
pub use config::CanvasConfig;
pub use detail::{DetailLevel, GridDetailLevel, LevelId};
pub use error::TileCanvasError;
pub use geom::PixelRect;
pub use provider::{BitmapProvider, DecodeContext, DecodeError, PatternBitmapProvider};
pub use tile::{SharedTile, Tile, TileState};

/// Version of the TileCanvas library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
