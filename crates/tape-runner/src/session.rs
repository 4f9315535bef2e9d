//! One ingest session: bootstrap, stream for a window, read back, tear down.
//!
//! The feed is always disconnected before [`run_session`] returns, whatever
//! happened before it. Failures are logged once and reported in the
//! returned [`SessionReport`]; they never propagate out of the session.

use std::sync::Arc;
use std::time::Duration;

use tape_core::config::CosmosConfig;
use tape_md::TradeFeed;
use tape_sink::cosmos::{CosmosClient, CosmosError};
use tape_sink::ingest::{IngestStats, run_consumer};
use tape_sink::{bootstrap, readback};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Upper bound on waiting for the consumer to drain after disconnect.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("database error: {}", .0.message())]
    Database(#[from] CosmosError),

    #[error("stream error: {0}")]
    Stream(anyhow::Error),
}

/// Parameters of one session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// How long to ingest before reading back.
    pub window: Duration,
    /// Bound of the batch channel between feed and consumer.
    pub channel_capacity: usize,
}

/// What a session did.
#[derive(Debug, Default)]
pub struct SessionReport {
    /// Ids found by the readback, if it ran.
    pub readback_ids: Option<Vec<String>>,
    /// Consumer totals, if the consumer was started.
    pub ingest: Option<IngestStats>,
    /// The error that ended the session early.
    pub error: Option<SessionError>,
    /// Whether the window ended on the cancellation token.
    pub cancelled: bool,
}

/// Run one session against `feed`.
pub async fn run_session<F>(
    client: &CosmosClient,
    cosmos: &CosmosConfig,
    feed: &mut F,
    params: &SessionParams,
    cancel: CancellationToken,
) -> SessionReport
where
    F: TradeFeed + ?Sized,
{
    let mut report = SessionReport::default();
    let mut consumer: Option<JoinHandle<IngestStats>> = None;

    match ingest_window(client, cosmos, feed, params, &cancel, &mut consumer, &mut report).await {
        Ok(ids) => report.readback_ids = Some(ids),
        Err(e) => {
            error!("session has caught an error: {e}");
            report.error = Some(e);
        }
    }

    // Cleanup runs on every path.
    if let Err(e) = feed.disconnect().await {
        warn!("[{}] disconnect failed: {e}", feed.name());
    }
    if let Some(handle) = consumer {
        report.ingest = drain_consumer(handle).await;
    }

    info!("session done");
    report
}

async fn ingest_window<F>(
    client: &CosmosClient,
    cosmos: &CosmosConfig,
    feed: &mut F,
    params: &SessionParams,
    cancel: &CancellationToken,
    consumer: &mut Option<JoinHandle<IngestStats>>,
    report: &mut SessionReport,
) -> Result<Vec<String>, SessionError>
where
    F: TradeFeed + ?Sized,
{
    let container = Arc::new(bootstrap::bootstrap(client, cosmos).await?);

    let (tx, rx) = tokio::sync::mpsc::channel(params.channel_capacity.max(1));
    *consumer = Some(tokio::spawn(run_consumer(Arc::clone(&container), rx)));

    feed.connect(tx).await.map_err(SessionError::Stream)?;
    info!("[{}] streaming for {:?}", feed.name(), params.window);

    tokio::select! {
        _ = tokio::time::sleep(params.window) => {}
        _ = cancel.cancelled() => {
            info!("session cancelled before the window elapsed");
            report.cancelled = true;
        }
    }

    Ok(readback::read_items(container.as_ref(), cosmos.page_size).await?)
}

async fn drain_consumer(mut handle: JoinHandle<IngestStats>) -> Option<IngestStats> {
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(stats)) => Some(stats),
        Ok(Err(e)) => {
            error!("ingest consumer failed: {e}");
            None
        }
        Err(_) => {
            warn!("ingest consumer still busy after {DRAIN_TIMEOUT:?}, aborting it");
            handle.abort();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tape_core::{MarketRef, Trade, TradesUpdate};
    use tape_md::{BatchSender, StreamState};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const KEY: &str = "dGVzdC1tYXN0ZXIta2V5";

    /// Feed that publishes a fixed list of batches on connect.
    struct ScriptedFeed {
        state: StreamState,
        script: Vec<TradesUpdate>,
        _tx: Option<BatchSender>,
        disconnects: Arc<AtomicUsize>,
        fail_connect: bool,
    }

    impl ScriptedFeed {
        fn new(script: Vec<TradesUpdate>) -> Self {
            Self {
                state: StreamState::NotConnected,
                script,
                _tx: None,
                disconnects: Arc::new(AtomicUsize::new(0)),
                fail_connect: false,
            }
        }
    }

    #[async_trait]
    impl TradeFeed for ScriptedFeed {
        fn name(&self) -> &str {
            "scripted"
        }

        fn state(&self) -> StreamState {
            self.state
        }

        async fn connect(&mut self, tx: BatchSender) -> Result<()> {
            if self.fail_connect {
                bail!("handshake refused");
            }
            for update in self.script.drain(..) {
                tx.send(update).await?;
            }
            self._tx = Some(tx);
            self.state = StreamState::Connected;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<()> {
            self._tx = None;
            self.state = StreamState::Disconnected;
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn batch(ids: &[&str]) -> TradesUpdate {
        TradesUpdate {
            market: MarketRef { market_id: 65, exchange_id: 4, currency_pair_id: 9 },
            trades: ids
                .iter()
                .map(|id| Trade {
                    external_id: id.to_string(),
                    timestamp: 1_700_000_000,
                    timestamp_nano: 500,
                    price_str: "123.45".into(),
                    amount_str: "0.01".into(),
                    order_side: None,
                })
                .collect(),
        }
    }

    fn cosmos_config(server: &MockServer) -> CosmosConfig {
        serde_json::from_value(json!({
            "host": server.uri(),
            "master_key": KEY,
            "database_id": "tape",
            "container_id": "trades"
        }))
        .unwrap()
    }

    fn client(server: &MockServer) -> CosmosClient {
        CosmosClient::new(&server.uri(), KEY, "tape-test", Duration::from_secs(5)).unwrap()
    }

    fn params(window: Duration) -> SessionParams {
        SessionParams { window, channel_capacity: 16 }
    }

    async fn mount_bootstrap(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/dbs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "tape" })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dbs/tape/colls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "trades",
                "partitionKey": { "paths": ["/partitionKey"], "kind": "Hash" },
                "_rid": "AAAAAA==",
                "_self": "dbs/AAAA==/colls/AAAAAA==/"
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/offers"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "code": "BadRequest", "message": "serverless" })),
            )
            .mount(server)
            .await;
    }

    async fn mount_docs(server: &MockServer, expected_writes: u64, stored: Vec<Value>) {
        Mock::given(method("POST"))
            .and(path("/dbs/tape/colls/trades/docs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "created" })))
            .expect(expected_writes)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dbs/tape/colls/trades/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Documents": stored })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn full_session_ingests_and_reads_back() {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        let stored = vec![json!({ "id": "a" }), json!({ "id": "b" }), json!({ "id": "c" })];
        mount_docs(&server, 3, stored).await;

        let mut feed = ScriptedFeed::new(vec![batch(&["T1", "T2"]), batch(&[]), batch(&["T3"])]);
        let disconnects = Arc::clone(&feed.disconnects);

        let report = run_session(
            &client(&server),
            &cosmos_config(&server),
            &mut feed,
            &params(Duration::from_millis(50)),
            CancellationToken::new(),
        )
        .await;

        assert!(report.error.is_none(), "{:?}", report.error);
        assert_eq!(report.readback_ids.unwrap(), vec!["a", "b", "c"]);
        let ingest = report.ingest.unwrap();
        assert_eq!(ingest.batches, 3);
        assert_eq!(ingest.written, 3);
        assert_eq!(feed.state(), StreamState::Disconnected);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bootstrap_failure_still_disconnects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dbs"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "code": "Unauthorized", "message": "bad sig" })),
            )
            .mount(&server)
            .await;

        let mut feed = ScriptedFeed::new(vec![batch(&["T1"])]);
        let disconnects = Arc::clone(&feed.disconnects);

        let report = run_session(
            &client(&server),
            &cosmos_config(&server),
            &mut feed,
            &params(Duration::from_secs(60)),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(report.error, Some(SessionError::Database(_))));
        assert!(report.readback_ids.is_none());
        assert!(report.ingest.is_none());
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(feed.state(), StreamState::Disconnected);
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        mount_docs(&server, 0, vec![]).await;

        let mut feed = ScriptedFeed::new(vec![]);
        feed.fail_connect = true;
        let disconnects = Arc::clone(&feed.disconnects);

        let report = run_session(
            &client(&server),
            &cosmos_config(&server),
            &mut feed,
            &params(Duration::from_secs(60)),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(report.error, Some(SessionError::Stream(_))));
        assert_eq!(report.ingest.unwrap().batches, 0);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_ends_window_early() {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        mount_docs(&server, 1, vec![json!({ "id": "a" })]).await;

        let mut feed = ScriptedFeed::new(vec![batch(&["T1"])]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = client(&server);
        let cosmos = cosmos_config(&server);
        let params = params(Duration::from_secs(3600));
        let session = run_session(&client, &cosmos, &mut feed, &params, cancel);
        let report = tokio::time::timeout(Duration::from_secs(10), session)
            .await
            .expect("cancelled session should finish promptly");

        assert!(report.cancelled);
        assert_eq!(report.readback_ids.unwrap(), vec!["a"]);
        assert_eq!(report.ingest.unwrap().written, 1);
    }
}
