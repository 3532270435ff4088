//! pinalbum - drop pins and browse nearby Flickr photos from the terminal.
//!
//! Pins and their albums are kept on disk, so albums that were loaded once
//! can be browsed offline.

mod commands;
mod format;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pinalbum_core::{AlbumStore, Config};

/// Log file name prefix inside `--log-dir`
const LOG_FILE_PREFIX: &str = "pinalbum.log";

#[derive(Parser)]
#[command(name = "pinalbum", version, about = "Drop pins and browse nearby Flickr photos")]
struct Cli {
    /// Flickr API key (overrides FLICKR_API_KEY and config.json)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage pins
    #[command(subcommand)]
    Pins(PinCommand),

    /// Show a pin's album, downloading it if needed
    Album {
        pin_id: String,
        /// Page of search results to show
        #[arg(long)]
        page: Option<u32>,
        /// Download again even if a stored album exists
        #[arg(long)]
        refresh: bool,
    },

    /// Replace a pin's album with the next page of photos
    NewCollection { pin_id: String },

    /// Delete photos from a pin's album
    Delete {
        pin_id: String,
        #[arg(required = true)]
        photo_ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PinCommand {
    /// Drop a pin at a latitude/longitude
    #[command(allow_negative_numbers = true)]
    Add { latitude: f64, longitude: f64 },

    /// List pins and their stored albums
    List,

    /// Remove a pin and its stored photos
    Remove { pin_id: String },
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());
    info!("pinalbum starting");

    let mut config = match Config::load() {
        Ok(c) => c.with_env_overrides(),
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default().with_env_overrides()
        }
    };
    if let Some(key) = cli.api_key {
        config.api_key = Some(key);
    }

    let store = AlbumStore::new(config.cache_dir()?)?;

    match cli.command {
        Command::Pins(PinCommand::Add { latitude, longitude }) => {
            commands::add_pin(&store, latitude, longitude)
        }
        Command::Pins(PinCommand::List) => commands::list_pins(&store),
        Command::Pins(PinCommand::Remove { pin_id }) => commands::remove_pin(&store, &pin_id),
        Command::Album {
            pin_id,
            page,
            refresh,
        } => commands::show_album(&config, &store, &pin_id, page, refresh).await,
        Command::NewCollection { pin_id } => {
            commands::new_collection(&config, &store, &pin_id).await
        }
        Command::Delete { pin_id, photo_ids } => {
            commands::delete_photos(&store, &pin_id, &photo_ids)
        }
    }
}
