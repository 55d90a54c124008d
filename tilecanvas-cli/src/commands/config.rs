//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show`, and `config path` for the INI file
//! read by `tilecanvas render`.

use clap::Subcommand;
use std::path::{Path, PathBuf};
use tilecanvas::config::{config_file_path, format_size, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against `path`, or the default location.
pub fn run(command: ConfigCommands, path: Option<PathBuf>) -> Result<(), CliError> {
    let path = path.unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if force {
        ConfigFile::default().save_to(path)?;
        println!("Wrote default configuration to {}", path.display());
    } else if ConfigFile::ensure_exists_at(path)? {
        println!("Created {}", path.display());
    } else {
        println!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "(defaults, file not found)".to_string()
    };

    println!("Configuration: {}", source);
    println!();
    for line in describe(&config) {
        println!("{}", line);
    }
    Ok(())
}

/// Section and key listing of `config`.
fn describe(config: &ConfigFile) -> Vec<String> {
    let threads = if config.decode.threads == 0 {
        "auto".to_string()
    } else {
        config.decode.threads.to_string()
    };

    vec![
        "[render]".to_string(),
        format!("  buffer_ms = {}", config.render.buffer_ms),
        format!("  recycle_bitmaps = {}", config.render.recycle_bitmaps),
        "[transition]".to_string(),
        format!("  enabled = {}", config.transition.enabled),
        format!("  duration_ms = {}", config.transition.duration_ms),
        "[decode]".to_string(),
        format!("  threads = {}", threads),
        format!("  pool_size = {}", format_size(config.decode.pool_size)),
        "[logging]".to_string(),
        format!("  directory = {}", config.logging.directory.display()),
        format!("  file = {}", config.logging.file),
    ]
}
