//! Websocket-backed trade feed.
//!
//! [`TradeStream`] wires a [`WsSession`] to the batch channel:
//!
//! ```text
//! WsSession ──text──► parse_message ──Trades──► BatchSender (try_send)
//!           ──binary─► counted and dropped (JSON format only)
//! ```
//!
//! The session waits for the authentication acknowledgement before sending
//! the subscribe message, and re-subscribes the same way after a reconnect.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tape_core::ws::{OnBinaryCallback, OnTextCallback, SubscribeTrigger, WsSession, WsSessionConfig};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::json_parser::{self, FeedEvent};
use crate::{BatchSender, StreamState, TradeFeed};

/// Counters updated from the websocket callbacks.
#[derive(Debug, Default)]
pub struct FeedStats {
    pub messages: AtomicU64,
    pub batches: AtomicU64,
    pub trades: AtomicU64,
    pub dropped_batches: AtomicU64,
    pub parse_errors: AtomicU64,
    pub binary_frames: AtomicU64,
}

impl FeedStats {
    fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FeedStatsSnapshot {
        FeedStatsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            trades: self.trades.load(Ordering::Relaxed),
            dropped_batches: self.dropped_batches.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            binary_frames: self.binary_frames.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FeedStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStatsSnapshot {
    pub messages: u64,
    pub batches: u64,
    pub trades: u64,
    pub dropped_batches: u64,
    pub parse_errors: u64,
    pub binary_frames: u64,
}

/// Trade feed over a single websocket subscription.
pub struct TradeStream {
    name: String,
    config: FeedConfig,
    state: StreamState,
    session: Option<WsSession>,
    stats: Arc<FeedStats>,
}

impl TradeStream {
    pub fn new(name: impl Into<String>, config: FeedConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: StreamState::NotConnected,
            session: None,
            stats: Arc::new(FeedStats::default()),
        }
    }

    pub fn stats(&self) -> FeedStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.config.subscriptions
    }
}

/// Decode one text frame and publish trade batches.
///
/// Never blocks: a full channel drops the batch and counts it.
pub fn dispatch_text(label: &str, text: &str, tx: &BatchSender, stats: &FeedStats) {
    FeedStats::bump(&stats.messages, 1);

    match json_parser::parse_message(text) {
        Ok(FeedEvent::Trades(update)) => {
            let n = update.len() as u64;
            match tx.try_send(update) {
                Ok(()) => {
                    FeedStats::bump(&stats.batches, 1);
                    FeedStats::bump(&stats.trades, n);
                }
                Err(TrySendError::Full(_)) => {
                    FeedStats::bump(&stats.dropped_batches, 1);
                    warn!("[{label}] batch channel full, dropping {n} trade(s)");
                }
                Err(TrySendError::Closed(_)) => {
                    FeedStats::bump(&stats.dropped_batches, 1);
                    debug!("[{label}] batch channel closed, dropping {n} trade(s)");
                }
            }
        }
        Ok(FeedEvent::Authenticated { status }) => {
            info!("[{label}] authentication result: {status}")
        }
        Ok(FeedEvent::Subscribed { subscribed, failed }) => {
            info!("[{label}] subscribed to {subscribed} resource(s)");
            for failure in failed {
                warn!("[{label}] subscription failed: {failure}");
            }
        }
        Ok(FeedEvent::Ignored) => {}
        Err(e) => {
            FeedStats::bump(&stats.parse_errors, 1);
            debug!("[{label}] {e}");
        }
    }
}

#[async_trait]
impl TradeFeed for TradeStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> StreamState {
        self.state
    }

    async fn connect(&mut self, tx: BatchSender) -> Result<()> {
        if self.state != StreamState::NotConnected {
            bail!("[{}] connect called in state {:?}", self.name, self.state);
        }

        let label = self.name.clone();
        let stats = Arc::clone(&self.stats);
        let on_text: OnTextCallback =
            Arc::new(move |text: &str| dispatch_text(&label, text, &tx, &stats));

        let stats = Arc::clone(&self.stats);
        let on_binary: OnBinaryCallback =
            Arc::new(move |_data: &[u8]| FeedStats::bump(&stats.binary_frames, 1));

        let mut session = WsSession::new(WsSessionConfig {
            url: self.config.url.clone(),
            subscribe_msg: Some(json_parser::build_subscribe(&self.config.subscriptions)),
            subscribe_trigger: SubscribeTrigger::OnMessage(json_parser::is_authenticated),
            extra_headers: HashMap::new(),
            ping_interval: self.config.ping_interval,
            label: self.name.clone(),
        });
        session.start(on_text, Some(on_binary));

        self.session = Some(session);
        self.state = StreamState::Connected;
        info!("[{}] connected, subscriptions={:?}", self.name, self.config.subscriptions);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.stop().await;
        }
        if self.state != StreamState::Disconnected {
            let s = self.stats.snapshot();
            info!(
                "[{}] disconnected: messages={} batches={} trades={} dropped={} \
                 parse_errors={} binary={}",
                self.name,
                s.messages,
                s.batches,
                s.trades,
                s.dropped_batches,
                s.parse_errors,
                s.binary_frames,
            );
        }
        self.state = StreamState::Disconnected;
        Ok(())
    }
}
