//! Trade updates, the core data flowing from the feed to the database.

use serde::{Deserialize, Serialize};

use super::lenient;

/// Market identifier triple attached to every update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRef {
    #[serde(default, deserialize_with = "lenient::number")]
    pub market_id: u64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub exchange_id: u64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub currency_pair_id: u64,
}

/// A single trade execution as reported by the feed.
///
/// Price and amount stay as decimal strings; the sink never does arithmetic
/// on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Exchange-assigned trade identifier.
    #[serde(default, deserialize_with = "lenient::string")]
    pub external_id: String,
    /// Seconds since Unix epoch.
    #[serde(default, deserialize_with = "lenient::number")]
    pub timestamp: i64,
    /// Nanosecond part of the timestamp.
    #[serde(default, deserialize_with = "lenient::number")]
    pub timestamp_nano: i64,
    #[serde(default)]
    pub price_str: String,
    #[serde(default)]
    pub amount_str: String,
    /// Taker side, when the feed provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_side: Option<String>,
}

/// One batch of trades for a single market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradesUpdate {
    pub market: MarketRef,
    pub trades: Vec<Trade>,
}

impl TradesUpdate {
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
