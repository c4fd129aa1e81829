//! Insert Node
//!
//! Main entry point: ingests image files, optionally derives converted copies,
//! inserts them through the simulated node and prints the final records.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insert_node::{BatchOptions, Config, Pipeline};

#[derive(Parser)]
#[command(name = "insert-node")]
#[command(about = "Insert image files through a simulated content-addressed network")]
struct Cli {
    /// Scale to this width; height follows the aspect ratio unless given
    #[arg(long)]
    width: Option<u32>,

    /// Scale to this height; width follows the aspect ratio unless given
    #[arg(long)]
    height: Option<u32>,

    /// Re-encode to this MIME type (image/png, image/jpeg, image/gif, image/bmp)
    #[arg(long)]
    mime_type: Option<String>,

    /// Filename to insert under; its extension is adjusted to the image type
    #[arg(long)]
    filename: Option<String>,

    /// Only ingest and convert, do not insert
    #[arg(long)]
    no_insert: bool,

    /// Image files to process
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,insert_node=debug,image_store=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!("Starting Insert Node");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Insert latency: {}ms", config.insert_latency_ms);
    info!("  Failure rate: {}", config.failure_rate);
    info!("  Max insert size: {} bytes", config.max_insert_bytes);
    info!("  Timeout: {}s", config.timeout_secs);

    let pipeline = Pipeline::new(&config, Handle::current());

    let options = BatchOptions {
        filename: cli.filename,
        mime_type: cli.mime_type,
        width: cli.width,
        height: cli.height,
        insert: !cli.no_insert,
    };

    let entries = pipeline.run(&cli.files, &options).await?;

    let json = serde_json::to_string_pretty(&entries).context("Failed to serialize results")?;
    println!("{}", json);

    info!("Processed {} files", entries.len());

    Ok(())
}
