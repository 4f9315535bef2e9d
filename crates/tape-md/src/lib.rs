//! # tape-md
//!
//! Market data side of the trade tape sink.
//!
//! A [`TradeFeed`] owns the websocket subscription and publishes every
//! decoded [`TradesUpdate`] onto a bounded channel. Whoever holds the
//! receiving end decides how batches are persisted; the feed never blocks on
//! a slow consumer.
//!
//! - [`config`]: endpoint URL and subscription settings
//! - [`json_parser`]: feed message decoding and subscribe message building
//! - [`stream`]: [`stream::TradeStream`], the websocket-backed feed

pub mod config;
pub mod json_parser;
pub mod stream;

use anyhow::Result;
use async_trait::async_trait;
use tape_core::TradesUpdate;

/// Sending half of the batch channel handed to a feed on connect.
pub type BatchSender = tokio::sync::mpsc::Sender<TradesUpdate>;

/// Receiving half of the batch channel, drained by the ingest consumer.
pub type BatchReceiver = tokio::sync::mpsc::Receiver<TradesUpdate>;

/// Connection lifecycle of a feed.
///
/// Transitions are one-way: `NotConnected → Connected → Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotConnected,
    Connected,
    Disconnected,
}

/// Trait implemented by trade feeds.
#[async_trait]
pub trait TradeFeed: Send {
    /// Human-readable feed name.
    fn name(&self) -> &str;

    fn state(&self) -> StreamState;

    /// Begin receiving. Batches are published on `tx`.
    ///
    /// Fails if the feed has already been connected once.
    async fn connect(&mut self, tx: BatchSender) -> Result<()>;

    /// Stop receiving and release the connection.
    ///
    /// Always leaves the feed in [`StreamState::Disconnected`]; calling it
    /// again, or before `connect`, is harmless.
    async fn disconnect(&mut self) -> Result<()>;
}
