//! Single WebSocket session with auto-reconnect and ping keep-alive.
//!
//! Each `WsSession` runs as a tokio task that:
//! 1. Connects to the feed endpoint (TLS).
//! 2. Sends the subscription message, either right away or once the server
//!    has sent a message accepted by the [`SubscribeTrigger`].
//! 3. Reads messages and forwards them to a callback.
//! 4. Sends periodic WebSocket pings.
//! 5. Reconnects on disconnection with exponential backoff until stopped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::TapeError;

/// Callback invoked for each received text message.
pub type OnTextCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked for each received binary message.
pub type OnBinaryCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// When to send the subscription message.
#[derive(Debug, Clone)]
pub enum SubscribeTrigger {
    /// Immediately after the handshake completes.
    OnConnect,
    /// After the first inbound text message for which the predicate holds
    /// (e.g. an authentication acknowledgement).
    OnMessage(fn(&str) -> bool),
}

/// Configuration for a single WebSocket session.
#[derive(Debug, Clone)]
pub struct WsSessionConfig {
    /// Full WebSocket URL including query parameters.
    pub url: String,
    /// Message that subscribes to the wanted resources.
    pub subscribe_msg: Option<String>,
    pub subscribe_trigger: SubscribeTrigger,
    /// Extra HTTP headers for the handshake.
    pub extra_headers: HashMap<String, String>,
    /// Interval between WebSocket ping frames.
    pub ping_interval: Option<Duration>,
    /// Label used in log lines.
    pub label: String,
}

/// A WebSocket session managed by a background tokio task.
pub struct WsSession {
    pub config: WsSessionConfig,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsSession {
    /// Create a new (not yet started) session.
    pub fn new(config: WsSessionConfig) -> Self {
        Self { config, shutdown_tx: None, task: None }
    }

    /// Whether the background task has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start the session task.
    ///
    /// Text frames go to `on_text`; binary frames go to `on_binary` when set.
    pub fn start(&mut self, on_text: OnTextCallback, on_binary: Option<OnBinaryCallback>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            session_loop(config, on_text, on_binary, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Stop the session and wait for the task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("[{}] session task ended abnormally: {e}", self.config.label);
            }
        }
    }
}

/// Session loop. Reconnects with backoff until shutdown is signalled.
async fn session_loop(
    config: WsSessionConfig,
    on_text: OnTextCallback,
    on_binary: Option<OnBinaryCallback>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = INITIAL_BACKOFF;
    let label = config.label.as_str();

    loop {
        if *shutdown_rx.borrow() {
            info!("[{label}] shutdown requested");
            return;
        }

        info!("[{label}] connecting to {}", redact_query(&config.url));

        let ws_stream = match connect_ws(&config).await {
            Ok(s) => {
                backoff = INITIAL_BACKOFF;
                info!("[{label}] connected");
                s
            }
            Err(e) => {
                error!("[{label}] connection failed: {e}, retrying in {backoff:?}");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown_rx.changed() => return,
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();

        // Pending until sent; re-armed on every reconnect.
        let mut pending_subscribe = config.subscribe_msg.clone();

        if matches!(config.subscribe_trigger, SubscribeTrigger::OnConnect) {
            if let Some(sub_msg) = pending_subscribe.take() {
                debug!("[{label}] subscribing: {sub_msg}");
                if let Err(e) = ws_write.send(Message::Text(sub_msg.into())).await {
                    error!("[{label}] subscribe send failed: {e}");
                    continue;
                }
            }
        }

        // First ping fires one period after connecting.
        let mut ping_timer = config
            .ping_interval
            .map(|period| tokio::time::interval_at(tokio::time::Instant::now() + period, period));

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("[{label}] shutdown signal received");
                    let _ = ws_write.close().await;
                    return;
                }

                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let trigger = &config.subscribe_trigger;
                            let ready = take_ready(trigger, &mut pending_subscribe, &text);
                            if let Some(sub_msg) = ready {
                                debug!("[{label}] subscribing: {sub_msg}");
                                if let Err(e) = ws_write.send(Message::Text(sub_msg.into())).await {
                                    error!("[{label}] subscribe send failed: {e}");
                                    break;
                                }
                            }
                            on_text(&text);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if let Some(ref cb) = on_binary {
                                cb(&data);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            warn!("[{label}] received close frame: {frame:?}");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("[{label}] read error: {e}");
                            break;
                        }
                        None => {
                            warn!("[{label}] stream ended");
                            break;
                        }
                        _ => {}
                    }
                }

                _ = async {
                    match ping_timer.as_mut() {
                        Some(timer) => {
                            timer.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if let Err(e) = ws_write.send(Message::Ping(Vec::<u8>::new().into())).await {
                        error!("[{label}] ping send error: {e}");
                        break;
                    }
                }
            }
        }

        warn!("[{label}] disconnected, reconnecting in {backoff:?}");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {},
            _ = shutdown_rx.changed() => return,
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Hand out the pending subscription once `text` satisfies the trigger.
fn take_ready(
    trigger: &SubscribeTrigger,
    pending: &mut Option<String>,
    text: &str,
) -> Option<String> {
    match trigger {
        SubscribeTrigger::OnMessage(ready) if pending.is_some() && ready(text) => pending.take(),
        _ => None,
    }
}

/// Establish a TLS WebSocket connection.
async fn connect_ws(config: &WsSessionConfig) -> Result<WsStream, TapeError> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

    let mut request = config.url.as_str().into_client_request().map_err(ws_err)?;
    for (key, value) in &config.extra_headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(ws_err)?;
        let value = HeaderValue::from_str(value).map_err(ws_err)?;
        request.headers_mut().insert(name, value);
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(ws_err)?;
    Ok(stream)
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn ws_err(e: impl std::fmt::Display) -> TapeError {
    TapeError::WebSocket(e.to_string())
}

/// Strip the query string so API keys never reach the logs.
pub fn redact_query(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut u) => {
            if u.query().is_some() {
                u.set_query(Some("<redacted>"));
            }
            u.to_string()
        }
        Err(_) => url.split('?').next().unwrap_or_default().to_string(),
    }
}
