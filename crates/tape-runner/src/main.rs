//! # tape-runner
//!
//! Entry point for the trade tape sink.
//!
//! Loads a JSON configuration file, prepares the database container,
//! streams trades into it for a fixed window, then prints every stored
//! document id and disconnects.
//!
//! # Usage
//!
//! ```bash
//! tape-runner config.json --log-level info --duration-secs 5 \
//!     --subscription 'markets:*:trades'
//! ```

mod session;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tape_md::TradeFeed;
use tape_md::config::FeedConfig;
use tape_md::stream::TradeStream;
use tape_sink::cosmos::CosmosClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::session::{SessionParams, run_session};

/// Trade stream to document database sink.
#[derive(Parser)]
#[command(name = "tape-runner", about = "Trade stream to document database sink")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output (overrides `logging.log_path`).
    #[arg(long)]
    log_dir: Option<String>,

    /// Ingest window in seconds (overrides `session.duration_secs`).
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Resource pattern to subscribe to; repeatable (overrides `stream.subscriptions`).
    #[arg(short, long = "subscription")]
    subscriptions: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration (fatal on error)
    let config = tape_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let log_dir = cli.log_dir.as_deref().or(config.logging.log_path.as_deref());
    let _log_guard =
        tape_core::logging::init_logging(&cli.log_level, log_dir, &config.logging.module_name);

    let window = Duration::from_secs(cli.duration_secs.unwrap_or(config.session.duration_secs));
    info!(
        "tape-runner starting: config={}, database={}, container={}, window={window:?}",
        cli.config.display(),
        config.cosmos.database_id,
        config.cosmos.container_id,
    );

    // 3. Build the database client and the trade feed
    let client = CosmosClient::from_config(&config.cosmos)?;
    let feed_config =
        FeedConfig::from_stream_config(&config.stream)?.with_subscriptions(cli.subscriptions);
    let mut feed = TradeStream::new("cryptowatch", feed_config);
    info!("[{}] subscriptions={:?}", feed.name(), feed.subscriptions());

    // 4. Ctrl+C ends the ingest window early
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                cancel.cancel();
            }
        }
    });

    // 5. Run the session; its failures are logged, not fatal
    let params = SessionParams { window, channel_capacity: config.stream.channel_capacity };
    let report = run_session(&client, &config.cosmos, &mut feed, &params, cancel).await;

    let s = feed.stats();
    info!(
        "tape-runner finished: stored={} written={} failed_batches={} feed_batches={} dropped={}",
        report.readback_ids.as_ref().map_or(0, Vec::len),
        report.ingest.map_or(0, |i| i.written),
        report.ingest.map_or(0, |i| i.failed_batches),
        s.batches,
        s.dropped_batches,
    );
    Ok(())
}
