//! notebridge daemon.
//!
//! Subscribes to text notes from the configured authors on a Nostr relay and
//! posts each new note to a Slack incoming webhook.
//!
//! # Usage
//!
//! ```bash
//! # Reads RELAY_URL and SLACK_WEBHOOK_URL from the environment or .env
//! notebridge
//!
//! # Custom .env location and Prometheus metrics on :9090
//! notebridge --dotenv /etc/notebridge/.env --metrics-port 9090
//! ```
//!
//! # Graceful Shutdown
//!
//! SIGINT (Ctrl+C) and SIGTERM stop the feed; a delivery already in flight
//! completes (or times out) first, then the relay is disconnected.

use anyhow::{Context, Result};
use clap::Parser;
use notebridge_core::AuthorDirectory;
use notebridge_core::metrics::{init_metrics, start_metrics_server};
use notebridge_ingest::{
    Config, DedupStore, IngestLoop, RelayConfig, RelayFeed, WebhookClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

/// Forward Nostr notes from selected authors to a Slack webhook.
#[derive(Parser, Debug)]
#[command(name = "notebridge")]
#[command(about = "Nostr relay to Slack webhook bridge")]
#[command(version)]
struct Args {
    /// Path to .env file (loaded if it exists)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: PathBuf,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env before tracing so RUST_LOG can come from it
    let dotenv_loaded = if args.dotenv.exists() {
        dotenvy::from_path(&args.dotenv)
            .with_context(|| format!("Failed to load {}", args.dotenv.display()))?;
        true
    } else {
        false
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,notebridge_ingest=debug".into()),
        )
        .init();

    if dotenv_loaded {
        tracing::info!("Loaded environment from {}", args.dotenv.display());
    }

    tracing::info!("notebridge starting...");

    if args.metrics_port > 0 {
        let metrics_handle = init_metrics()?;
        start_metrics_server(args.metrics_port, metrics_handle)
            .await
            .context("Failed to start metrics server")?;
    }

    // Set up graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping gracefully...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let config = Config::from_env().context("Invalid configuration")?;
    let (mut ingest, mut feed) = match init(&config, running).await {
        Ok(parts) => parts,
        Err(e)
            if matches!(
                e.downcast_ref::<notebridge_ingest::Error>(),
                Some(notebridge_ingest::Error::Interrupted)
            ) =>
        {
            tracing::info!("Shutdown requested during startup, exiting");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    tracing::info!("Starting live bridge...");
    let stats = ingest.run(&mut feed).await;

    tracing::info!("Shutting down...");
    let (feed_received, feed_lagged) = (feed.received(), feed.lagged());
    feed.disconnect().await;

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("SHUTDOWN COMPLETE");
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Events received:      {}", stats.received);
    tracing::info!("Relay notes:          {}", feed_received);
    tracing::info!("Lagged notifications: {}", feed_lagged);
    tracing::info!("Events delivered:     {}", stats.delivered);
    tracing::info!("Duplicates skipped:   {}", stats.duplicates);
    tracing::info!("Unknown authors:      {}", stats.unknown_authors);
    tracing::info!("Delivery failures:    {}", stats.delivery_failures);
    tracing::info!("Persist failures:     {}", stats.persist_failures);

    Ok(())
}

/// Load state and connect. Every error here is fatal to startup.
async fn init(
    config: &Config,
    running: Arc<AtomicBool>,
) -> Result<(IngestLoop<WebhookClient>, RelayFeed)> {
    let dedupe = DedupStore::load(&config.posted_notes_path).with_context(|| {
        format!(
            "Failed to load posted notes from {}",
            config.posted_notes_path.display()
        )
    })?;

    let authors = AuthorDirectory::load(&config.authors_path).with_context(|| {
        format!(
            "Failed to load authors from {}",
            config.authors_path.display()
        )
    })?;

    let delivery = WebhookClient::new(&config.webhook_url, config.delivery_timeout)
        .context("Failed to create webhook client")?;

    let relay_config = RelayConfig {
        relay_url: config.relay_url.clone(),
        authors: authors.keys().map(str::to_string).collect(),
        limit: config.subscription_limit,
        connect_timeout: config.relay_connect_timeout,
        ..Default::default()
    };

    let feed = RelayFeed::connect(relay_config, running)
        .await
        .with_context(|| format!("Failed to connect to relay {}", config.relay_url))?;

    tracing::info!("Configuration:");
    tracing::info!("  Relay: {}", feed.relay_url());
    tracing::info!("  Authors: {}", authors.len());
    tracing::info!(
        "  Posted notes: {} ({} known)",
        dedupe.path().display(),
        dedupe.len()
    );

    let ingest = IngestLoop::new(Arc::new(dedupe), Arc::new(authors), delivery);

    Ok((ingest, feed))
}
