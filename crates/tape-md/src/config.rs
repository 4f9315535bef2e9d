//! Trade feed configuration.
//!
//! Derived from the `stream` block of the application config. The only
//! transformation is building the connect URL: the API key and the JSON
//! wire format are passed as query parameters.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use tape_core::config::StreamConfig;

/// Settings for one [`TradeStream`](crate::stream::TradeStream).
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Connect URL with `apikey` and `format` query parameters applied.
    pub url: String,
    /// Resource patterns (e.g. `markets:*:trades`).
    pub subscriptions: Vec<String>,
    pub ping_interval: Option<Duration>,
}

impl FeedConfig {
    /// Build from the application's stream block.
    pub fn from_stream_config(cfg: &StreamConfig) -> Result<Self> {
        if cfg.subscriptions.is_empty() {
            bail!("at least one subscription is required");
        }
        let mut url = url::Url::parse(&cfg.url)
            .with_context(|| format!("invalid stream url: {}", cfg.url))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(key) = cfg.api_key.as_deref().filter(|k| !k.is_empty()) {
                query.append_pair("apikey", key);
            }
            query.append_pair("format", "json");
        }

        Ok(Self {
            url: url.into(),
            subscriptions: cfg.subscriptions.clone(),
            ping_interval: (cfg.ping_interval_sec > 0)
                .then(|| Duration::from_secs(cfg.ping_interval_sec)),
        })
    }

    /// Replace the subscription list (CLI override).
    pub fn with_subscriptions(mut self, subscriptions: Vec<String>) -> Self {
        if !subscriptions.is_empty() {
            self.subscriptions = subscriptions;
        }
        self
    }
}
