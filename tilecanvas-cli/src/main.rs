//! TileCanvas CLI - Command-line interface
//!
//! Drives the tilecanvas library: renders a scrolling viewport over a tiled
//! image and manages the configuration file.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tilecanvas::config::{config_file_path, CanvasConfig, ConfigFile};
use tilecanvas::logging::init_logging;

use commands::config::ConfigCommands;
use commands::render::RenderArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilecanvas")]
#[command(version = tilecanvas::VERSION)]
#[command(about = "Viewport-driven tile rendering", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.tilecanvas/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the log file (overrides the configuration)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a scrolling viewport to a PNG
    Render(RenderArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Render(args) => {
            let path = cli.config.unwrap_or_else(config_file_path);
            let file = ConfigFile::load_from(&path)?;

            let log_dir = cli.log_dir.unwrap_or_else(|| file.logging.directory.clone());
            let _logging = init_logging(&log_dir, &file.logging.file)
                .map_err(|e| CliError::LoggingInit(e.to_string()))?;

            let summary = commands::render::run(&args, CanvasConfig::from(&file))?;
            commands::render::print_summary(&summary);
            Ok(())
        }
        Commands::Config { command } => commands::config::run(command, cli.config),
    }
}
