//! Trade ingestion: one document per trade.
//!
//! [`handle_trades_update`] processes a single batch. [`run_consumer`]
//! drains the batch channel and calls it for every batch, strictly one
//! after another, until the feed side of the channel is closed.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tape_core::{Trade, TradesUpdate};
use thiserror::Error;
use tokio::sync::mpsc::Receiver;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ItemStore;
use crate::cosmos::CosmosError;

/// The persisted form of a trade: the trade fields plus a generated `id`.
///
/// The `id` is a fresh UUID per document and unrelated to the trade's
/// `externalId`, so a redelivered trade is stored twice.
#[derive(Debug, Clone, Serialize)]
pub struct TradeDocument<'a> {
    pub id: String,
    #[serde(flatten)]
    pub trade: &'a Trade,
}

impl<'a> TradeDocument<'a> {
    pub fn new(trade: &'a Trade) -> Self {
        Self { id: Uuid::new_v4().to_string(), trade }
    }

    pub fn to_value(&self) -> Result<Value, CosmosError> {
        serde_json::to_value(self).map_err(|e| CosmosError::Decode(e.to_string()))
    }
}

/// Batch summary line.
pub fn format_market_line(update: &TradesUpdate) -> String {
    format!(
        ">>> Market#{} Exchange#{} Pair#{}: {} New Trades",
        update.market.market_id,
        update.market.exchange_id,
        update.market.currency_pair_id,
        update.len()
    )
}

/// Per-trade line.
pub fn format_trade_line(trade: &Trade) -> String {
    format!(
        "\tID:{} TIMESTAMP:{} TIMESTAMPNANO:{} PRICE:{} AMOUNT:{}",
        trade.external_id, trade.timestamp, trade.timestamp_nano, trade.price_str, trade.amount_str
    )
}

/// A batch that stopped at a failed write.
///
/// `written` documents of the batch were stored before the failure.
#[derive(Debug, Error)]
#[error("{source} ({written} of {total} trade(s) written)")]
pub struct BatchError {
    pub written: usize,
    pub total: usize,
    pub source: CosmosError,
}

/// Log and persist every trade of one batch, in order.
///
/// Returns the number of documents written. The first failed write aborts
/// the rest of the batch; nothing is retried.
pub async fn handle_trades_update<S>(
    store: &S,
    update: &TradesUpdate,
) -> Result<usize, BatchError>
where
    S: ItemStore + ?Sized,
{
    info!("{}", format_market_line(update));

    let mut written = 0;
    for trade in &update.trades {
        info!("{}", format_trade_line(trade));

        let stored = match TradeDocument::new(trade).to_value() {
            Ok(doc) => store.create_item(&doc).await,
            Err(e) => Err(e),
        };
        if let Err(source) = stored {
            return Err(BatchError { written, total: update.len(), source });
        }
        written += 1;
    }
    Ok(written)
}

/// Totals accumulated by [`run_consumer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub batches: u64,
    pub trades: u64,
    pub written: u64,
    pub failed_batches: u64,
    /// Failed batches whose error was a 429.
    pub throttled: u64,
}

/// Drain `rx` until it closes, persisting each batch.
///
/// A failed batch is logged and skipped; the loop keeps going with the next
/// one.
pub async fn run_consumer<S>(store: Arc<S>, mut rx: Receiver<TradesUpdate>) -> IngestStats
where
    S: ItemStore + ?Sized,
{
    let mut stats = IngestStats::default();
    info!("[ingest] consumer started for container '{}'", store.id());

    while let Some(update) = rx.recv().await {
        stats.batches += 1;
        stats.trades += update.len() as u64;

        match handle_trades_update(store.as_ref(), &update).await {
            Ok(n) => stats.written += n as u64,
            Err(e) => {
                stats.written += e.written as u64;
                stats.failed_batches += 1;
                let market = update.market.market_id;
                if e.source.is_throttled() {
                    stats.throttled += 1;
                    warn!("[ingest] throttled while writing market {market}: {e}");
                } else {
                    error!("[ingest] failed to write market {market} batch: {e}");
                }
            }
        }
    }

    info!(
        "[ingest] consumer finished: batches={} trades={} written={} failed_batches={} \
         throttled={}",
        stats.batches,
        stats.trades,
        stats.written,
        stats.failed_batches,
        stats.throttled
    );
    stats
}
