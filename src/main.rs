//! # clipfuse CLI
//!
//! The `clipfuse` binary drives the trigger handler from the command line:
//! hand it a notification (or a bucket/key pair) and it collects, fuses, and
//! writes the consolidated envelope, printing the status result as JSON.
//!
//! ## Usage
//!
//! ```bash
//! clipfuse --config ./config/clipfuse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `clipfuse trigger --bucket <b> --key <k>` | Handle one "object created" notification |
//! | `clipfuse event <path\|->` | Handle a raw notification event from a file or stdin |
//! | `clipfuse fuse --bucket <b>` | Collect and fuse without the trigger filters |
//! | `clipfuse sources` | Show the configured prefixes and their modalities |
//!
//! Logs go to stderr (`RUST_LOG` controls the filter); results go to stdout.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use clipfuse::config::{self, Config};
use clipfuse::storage::{self, ObjectStore};
use clipfuse::trigger::{Notification, TriggerHandler, TriggerStatus};
use clipfuse::{collector, sink};

/// Temporal multi-modal metadata fusion for video annotations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means the built-in defaults.
#[derive(Parser)]
#[command(
    name = "clipfuse",
    about = "Fuse transcript, embedding and detection metadata into time-aligned clips",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/clipfuse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a notification for one newly created object.
    ///
    /// Exits non-zero only when the status code is 500.
    Trigger {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },

    /// Handle a raw notification event read from a JSON file.
    ///
    /// Accepts `{"bucket", "key"}` or the event-bus `detail` shape.
    Event {
        /// Path to the event JSON, or `-` for stdin.
        path: String,
    },

    /// Collect and fuse every source prefix in a bucket.
    ///
    /// Prints the envelope to stdout unless `--write` is given.
    Fuse {
        #[arg(long)]
        bucket: String,

        /// Write the envelope under the sink prefix instead of printing it.
        #[arg(long)]
        write: bool,
    },

    /// List configured source prefixes.
    Sources,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Trigger { bucket, key } => {
            let handler = handler(&cfg)?;
            let status = handler.handle(&Notification::new(bucket, key)).await;
            report(&status)
        }
        Commands::Event { path } => {
            let raw = read_event(&path)?;
            let event: serde_json::Value =
                serde_json::from_str(&raw).context("Failed to parse notification event")?;
            let status = handler(&cfg)?.handle_event(&event).await;
            report(&status)
        }
        Commands::Fuse { bucket, write } => {
            let store = storage::open_store(&cfg.storage)?;
            let sources = cfg.source_prefixes()?;
            let collection =
                collector::collect(store.as_ref(), &bucket, &sources, &cfg.trigger).await;
            for (key, reason) in collection.skipped() {
                eprintln!("skipped {}: {}", key, reason);
            }
            let envelope = sink::build_envelope(collection.fuse());
            if write {
                let written =
                    sink::write_envelope(store.as_ref(), &bucket, &cfg.sink.prefix, envelope)
                        .await?;
                println!("{}", written.location());
            } else {
                println!("{}", envelope.to_json_pretty()?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sources => {
            let sources = cfg.source_prefixes()?;
            println!("{:<20} {:<12}", "PREFIX", "MODALITY");
            for source in &sources {
                println!("{:<20} {:<12}", source.prefix, source.modality);
            }
            println!();
            println!("storage backend: {}", cfg.storage.backend);
            println!("sink prefix:     {}", cfg.sink.prefix);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn handler(cfg: &Config) -> Result<TriggerHandler> {
    let store: Arc<dyn ObjectStore> = storage::open_store(&cfg.storage)?;
    Ok(TriggerHandler::new(store, cfg)?)
}

fn read_event(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read event: {}", path))
    }
}

fn report(status: &TriggerStatus) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(status)?);
    Ok(if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
