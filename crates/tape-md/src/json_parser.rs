//! Trade feed JSON message parser.
//!
//! Messages are single-key envelopes. The key decides the event:
//!
//! - `authenticationResult` → [`FeedEvent::Authenticated`]
//! - `subscriptionResult` → [`FeedEvent::Subscribed`]
//! - `marketUpdate` with `tradesUpdate` → [`FeedEvent::Trades`]
//!
//! Anything else (other market update kinds, heartbeats) is
//! [`FeedEvent::Ignored`].

use serde::Deserialize;
use serde_json::{Value, json};
use tape_core::error::TapeError;
use tape_core::{MarketRef, Trade, TradesUpdate};

/// A decoded feed message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Authentication acknowledgement; `status` is e.g. `"AUTHENTICATED"`.
    Authenticated { status: String },
    /// Subscription acknowledgement.
    Subscribed { subscribed: usize, failed: Vec<String> },
    /// A batch of trades for one market.
    Trades(TradesUpdate),
    Ignored,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    authentication_result: Option<AuthenticationResult>,
    subscription_result: Option<SubscriptionResult>,
    market_update: Option<MarketUpdate>,
}

#[derive(Deserialize)]
struct AuthenticationResult {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct SubscriptionResult {
    #[serde(default)]
    subscribed: Vec<Value>,
    #[serde(default)]
    failed: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketUpdate {
    #[serde(default)]
    market: MarketRef,
    trades_update: Option<TradesPayload>,
}

#[derive(Deserialize)]
struct TradesPayload {
    #[serde(default)]
    trades: Vec<Trade>,
}

/// Parse one text frame.
pub fn parse_message(text: &str) -> Result<FeedEvent, TapeError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| TapeError::Parse(e.to_string()))?;

    if let Some(auth) = envelope.authentication_result {
        return Ok(FeedEvent::Authenticated { status: auth.status });
    }

    if let Some(result) = envelope.subscription_result {
        let failed = result.failed.iter().map(describe_failure).collect();
        return Ok(FeedEvent::Subscribed { subscribed: result.subscribed.len(), failed });
    }

    match envelope.market_update {
        Some(MarketUpdate { market, trades_update: Some(payload) }) => {
            Ok(FeedEvent::Trades(TradesUpdate { market, trades: payload.trades }))
        }
        _ => Ok(FeedEvent::Ignored),
    }
}

/// Whether a frame is a successful authentication acknowledgement.
///
/// Used as the websocket subscribe trigger: the server only accepts the
/// subscribe message after authentication.
pub fn is_authenticated(text: &str) -> bool {
    matches!(
        parse_message(text),
        Ok(FeedEvent::Authenticated { status }) if status == "AUTHENTICATED"
    )
}

/// Build the subscribe message for a list of resource patterns.
pub fn build_subscribe(resources: &[String]) -> String {
    let subscriptions: Vec<Value> = resources
        .iter()
        .map(|r| json!({ "streamSubscription": { "resource": r } }))
        .collect();

    json!({ "subscribe": { "subscriptions": subscriptions } }).to_string()
}

fn describe_failure(entry: &Value) -> String {
    let resource = entry
        .pointer("/subscription/streamSubscription/resource")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let error = entry
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    format!("{resource}: {error}")
}
