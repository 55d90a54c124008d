//! `tilecanvas render`: scroll a viewport over a tiled image and save the result.
//!
//! Builds a [`GridDetailLevel`] over a virtual image, renders it through a
//! [`TileCanvas`], and composites every viewport position onto one retained
//! surface. The saved PNG shows the union of everything that was drawn.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tilecanvas::canvas::{TileCanvas, TileRenderListener, FAST_RENDER_BUFFER};
use tilecanvas::config::CanvasConfig;
use tilecanvas::detail::GridDetailLevel;
use tilecanvas::provider::{
    BitmapProvider, DecodeError, FileBitmapProvider, PatternBitmapProvider, TilePattern,
};
use tilecanvas::surface::PixmapSurface;
use tilecanvas::{PixelRect, Tile, TileCanvasError};
use tracing::{info, warn};

use crate::error::CliError;

/// Largest output surface edge, in pixels.
const MAX_SURFACE_EDGE: u32 = 16_384;

/// Delay between redraws while tiles fade in.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Redraws per step before giving up on a fade.
const MAX_FADE_FRAMES: usize = 600;

/// Most scroll steps accepted by `--steps`.
const MAX_STEPS: u32 = 10_000;

/// Arguments for `tilecanvas render`.
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Full-resolution image width in pixels
    #[arg(long, default_value = "4096")]
    pub image_width: u32,

    /// Full-resolution image height in pixels
    #[arg(long, default_value = "4096")]
    pub image_height: u32,

    /// Tile edge length in pixels
    #[arg(long, default_value = "256")]
    pub tile_size: u32,

    /// Detail level scale (1.0 = full resolution)
    #[arg(long, default_value = "1.0")]
    pub scale: f32,

    /// Viewport width in full-resolution pixels
    #[arg(long, default_value = "1024")]
    pub viewport_width: i32,

    /// Viewport height in full-resolution pixels
    #[arg(long, default_value = "768")]
    pub viewport_height: i32,

    /// Number of scroll steps after the initial viewport
    #[arg(long, default_value = "8")]
    pub steps: u32,

    /// Horizontal scroll per step in full-resolution pixels
    #[arg(long, default_value = "256", allow_hyphen_values = true)]
    pub step_x: i32,

    /// Vertical scroll per step in full-resolution pixels
    #[arg(long, default_value = "128", allow_hyphen_values = true)]
    pub step_y: i32,

    /// Output surface pixels per full-resolution pixel
    #[arg(long, default_value = "0.25")]
    pub display_scale: f32,

    /// Directory of tile images (synthetic tiles are drawn if omitted)
    #[arg(long)]
    pub tiles_dir: Option<PathBuf>,

    /// File name pattern inside --tiles-dir; {col} and {row} are substituted
    #[arg(long, default_value = "{col}_{row}.png")]
    pub pattern: String,

    /// Use the short render buffer
    #[arg(long)]
    pub fast: bool,

    /// Draw tiles at full opacity immediately
    #[arg(long)]
    pub no_transitions: bool,

    /// Seconds to wait for each step to finish decoding
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Output PNG path
    #[arg(short, long, default_value = "tilecanvas.png")]
    pub output: PathBuf,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl RenderArgs {
    fn validate(&self) -> Result<(), CliError> {
        let invalid = |msg: &str| Err(CliError::InvalidArgument(msg.to_string()));
        if self.image_width == 0 || self.image_height == 0 {
            return invalid("--image-width and --image-height must be positive");
        }
        if self.tile_size == 0 {
            return invalid("--tile-size must be positive");
        }
        if self.scale.is_nan() || self.scale <= 0.0 || self.scale > 1.0 {
            return invalid("--scale must be in (0, 1]");
        }
        if self.viewport_width <= 0 || self.viewport_height <= 0 {
            return invalid("--viewport-width and --viewport-height must be positive");
        }
        if self.display_scale.is_nan() || self.display_scale <= 0.0 {
            return invalid("--display-scale must be positive");
        }
        if self.steps > MAX_STEPS {
            return Err(CliError::InvalidArgument(format!(
                "--steps must be at most {}",
                MAX_STEPS
            )));
        }
        if self.last_viewport().is_none() {
            return invalid("--steps, --step-x and --step-y move the viewport out of range");
        }
        let (width, height) = self.surface_size();
        if width == 0 || height == 0 || width > MAX_SURFACE_EDGE || height > MAX_SURFACE_EDGE {
            return Err(CliError::InvalidArgument(format!(
                "output surface {}x{} is out of range; adjust --display-scale",
                width, height
            )));
        }
        Ok(())
    }

    /// Output surface size covering the whole image.
    fn surface_size(&self) -> (u32, u32) {
        let edge = |v: u32| (v as f64 * self.display_scale as f64).ceil() as u32;
        (edge(self.image_width), edge(self.image_height))
    }

    /// Viewport at step `i`, or `None` if its edges overflow.
    fn viewport_at(&self, i: i32) -> Option<PixelRect> {
        let left = i.checked_mul(self.step_x)?;
        let top = i.checked_mul(self.step_y)?;
        Some(PixelRect::new(
            left,
            top,
            left.checked_add(self.viewport_width)?,
            top.checked_add(self.viewport_height)?,
        ))
    }

    fn last_viewport(&self) -> Option<PixelRect> {
        self.viewport_at(i32::try_from(self.steps).ok()?)
    }

    /// Viewport for every step, starting at the origin.
    ///
    /// Stops at the first step whose position overflows; `validate` rejects
    /// such arguments up front.
    fn viewports(&self) -> Vec<PixelRect> {
        let last = i32::try_from(self.steps).unwrap_or(i32::MAX);
        (0..=last).map_while(|i| self.viewport_at(i)).collect()
    }

    fn provider(&self) -> Arc<dyn BitmapProvider> {
        match &self.tiles_dir {
            Some(dir) => Arc::new(
                FileBitmapProvider::new(dir.clone())
                    .with_default_pattern(TilePattern::new(self.pattern.clone())),
            ),
            None => Arc::new(PatternBitmapProvider::new()),
        }
    }

    /// Apply command-line overrides to `config`.
    fn apply(&self, mut config: CanvasConfig) -> CanvasConfig {
        if self.fast {
            config = config.with_render_buffer(FAST_RENDER_BUFFER);
        }
        if self.no_transitions {
            config = config.with_transitions_enabled(false);
        }
        config
    }
}

/// Counters filled in by the canvas listener.
#[derive(Debug, Default)]
struct RenderCounters {
    started: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
    failed: AtomicUsize,
}

struct CountingListener(Arc<RenderCounters>);

impl TileRenderListener for CountingListener {
    fn on_render_start(&mut self) {
        self.0.started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_render_cancelled(&mut self) {
        self.0.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    fn on_render_complete(&mut self) {
        self.0.completed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_tile_decode_failed(&mut self, tile: &Tile, error: &DecodeError) {
        self.0.failed.fetch_add(1, Ordering::Relaxed);
        warn!(column = tile.column(), row = tile.row(), error = %error, "Tile failed");
    }
}

/// What a render run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub steps: usize,
    pub batches_started: usize,
    pub batches_completed: usize,
    pub batches_cancelled: usize,
    pub tile_failures: usize,
    pub tiles_drawn: usize,
    pub output: PathBuf,
}

/// Run the render command with `config` as the base configuration.
pub fn run(args: &RenderArgs, config: CanvasConfig) -> Result<RenderSummary, CliError> {
    args.validate()?;
    let config = args.apply(config);
    let timeout = Duration::from_secs(args.timeout);

    let mut canvas = TileCanvas::new(config, args.provider()).map_err(TileCanvasError::from)?;
    let counters = Arc::new(RenderCounters::default());
    canvas.set_tile_render_listener(Some(Box::new(CountingListener(Arc::clone(&counters)))));
    canvas.set_scale(args.display_scale);

    let level = Arc::new(GridDetailLevel::new(
        args.scale,
        args.tile_size,
        args.tile_size,
        args.image_width,
        args.image_height,
    ));
    let (width, height) = args.surface_size();
    let mut surface = PixmapSurface::new(width, height).map_err(|error| CliError::Output {
        path: args.output.clone(),
        error,
    })?;
    surface.fill(24, 24, 24, 255);

    let viewports = args.viewports();
    let progress = progress_bar(viewports.len() as u64, args.quiet);
    info!(
        steps = viewports.len(),
        image = %format!("{}x{}", args.image_width, args.image_height),
        scale = args.scale,
        "Starting render"
    );

    let mut tiles_drawn = 0;
    for (step, viewport) in viewports.iter().enumerate() {
        progress.set_message(format!("{}", viewport));
        level.set_viewport(*viewport);
        canvas.set_detail_level(level.clone());
        canvas.request_render();

        if !canvas.run_until_idle(timeout) {
            progress.abandon();
            return Err(CliError::RenderTimeout {
                step,
                timeout_secs: args.timeout,
            });
        }

        surface.set_clip(viewport.scaled(args.display_scale));
        let before = canvas.tile_sets().already_rendered().len();
        settle(&mut canvas, &mut surface);
        tiles_drawn += canvas
            .tile_sets()
            .already_rendered()
            .len()
            .saturating_sub(before);
        progress.inc(1);
    }
    progress.finish_with_message("done");

    surface
        .save_png(&args.output)
        .map_err(|error| CliError::Output {
            path: args.output.clone(),
            error,
        })?;
    canvas.destroy();

    let summary = RenderSummary {
        steps: viewports.len(),
        batches_started: counters.started.load(Ordering::Relaxed),
        batches_completed: counters.completed.load(Ordering::Relaxed),
        batches_cancelled: counters.cancelled.load(Ordering::Relaxed),
        tile_failures: counters.failed.load(Ordering::Relaxed),
        tiles_drawn,
        output: args.output.clone(),
    };
    info!(?summary, "Render finished");
    Ok(summary)
}

/// Redraw until no tile is fading.
fn settle(canvas: &mut TileCanvas, surface: &mut PixmapSurface) {
    for _ in 0..MAX_FADE_FRAMES {
        if !canvas.draw_tiles(surface) {
            return;
        }
        std::thread::sleep(FRAME_INTERVAL);
    }
    warn!("Tiles still fading after {} frames", MAX_FADE_FRAMES);
}

fn progress_bar(len: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Print `summary` for the user.
pub fn print_summary(summary: &RenderSummary) {
    println!("Rendered {} viewport positions", summary.steps);
    println!(
        "  Batches: {} started, {} completed, {} cancelled",
        summary.batches_started, summary.batches_completed, summary.batches_cancelled
    );
    println!("  Tiles drawn: {}", summary.tiles_drawn);
    if summary.tile_failures > 0 {
        println!("  Tile failures: {}", summary.tile_failures);
    }
    println!("  Output: {}", summary.output.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_args(output: PathBuf) -> RenderArgs {
        RenderArgs {
            image_width: 512,
            image_height: 512,
            tile_size: 64,
            scale: 1.0,
            viewport_width: 128,
            viewport_height: 128,
            steps: 2,
            step_x: 64,
            step_y: 0,
            display_scale: 0.5,
            tiles_dir: None,
            pattern: "{col}_{row}.png".to_string(),
            fast: true,
            no_transitions: true,
            timeout: 10,
            output,
            quiet: true,
        }
    }

    #[test]
    fn test_viewports_start_at_origin() {
        let args = small_args(PathBuf::from("out.png"));
        assert_eq!(
            args.viewports(),
            vec![
                PixelRect::new(0, 0, 128, 128),
                PixelRect::new(64, 0, 192, 128),
                PixelRect::new(128, 0, 256, 128),
            ]
        );
        assert_eq!(args.surface_size(), (256, 256));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut args = small_args(PathBuf::from("out.png"));
        args.scale = 0.0;
        assert!(matches!(args.validate(), Err(CliError::InvalidArgument(_))));

        let mut args = small_args(PathBuf::from("out.png"));
        args.display_scale = 100.0;
        assert!(matches!(args.validate(), Err(CliError::InvalidArgument(_))));

        let mut args = small_args(PathBuf::from("out.png"));
        args.tile_size = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_steps() {
        let mut args = small_args(PathBuf::from("out.png"));
        args.steps = 5_000;
        args.step_x = i32::MAX / 100;
        assert!(matches!(args.validate(), Err(CliError::InvalidArgument(_))));

        let mut args = small_args(PathBuf::from("out.png"));
        args.steps = 1;
        args.step_y = i32::MAX - 64;
        assert!(matches!(args.validate(), Err(CliError::InvalidArgument(_))));

        let mut args = small_args(PathBuf::from("out.png"));
        args.steps = MAX_STEPS + 1;
        args.step_x = 0;
        assert!(matches!(args.validate(), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_viewports_stop_before_overflow() {
        let mut args = small_args(PathBuf::from("out.png"));
        args.steps = 4;
        args.step_x = i32::MAX - 64;

        let viewports = args.viewports();
        assert_eq!(viewports.len(), 1);
        assert_eq!(viewports[0], PixelRect::new(0, 0, 128, 128));
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let args = small_args(PathBuf::from("out.png"));
        let config = args.apply(CanvasConfig::default());
        assert_eq!(config.render_buffer, FAST_RENDER_BUFFER);
        assert!(!config.transitions_enabled);
    }

    #[test]
    fn test_render_writes_png() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("render.png");
        let args = small_args(output.clone());

        let summary = run(&args, CanvasConfig::default()).unwrap();

        assert!(output.exists());
        assert_eq!(summary.steps, 3);
        // 2x2 tiles, then one new column per step
        assert_eq!(summary.tiles_drawn, 8);
        assert_eq!(summary.tile_failures, 0);
        assert_eq!(summary.batches_completed, 3);
    }

    #[test]
    fn test_missing_tile_files_are_reported() {
        let temp = TempDir::new().unwrap();
        let mut args = small_args(temp.path().join("render.png"));
        args.tiles_dir = Some(temp.path().join("tiles"));
        args.steps = 0;

        let summary = run(&args, CanvasConfig::default()).unwrap();
        assert_eq!(summary.tile_failures, 4);
        assert_eq!(summary.tiles_drawn, 0);
    }
}
