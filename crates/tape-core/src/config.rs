//! Configuration parsing for the trade tape sink.
//!
//! All settings come from a single JSON file. Only the database identity
//! (`host`, `master_key`, `database_id`, `container_id`) is required; every
//! other field has a default.
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "module_name": "tape", "log_path": "/tmp/log" },
//!   "stream": { "api_key": "XXXX", "subscriptions": ["markets:*:trades"] },
//!   "cosmos": {
//!     "host": "https://myaccount.documents.azure.com:443/",
//!     "master_key": "base64key==",
//!     "database_id": "tape",
//!     "container_id": "trades"
//!   },
//!   "session": { "duration_secs": 1 }
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::TapeError;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Logging metadata (file prefix, log directory).
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Market data stream settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Document database settings.
    pub cosmos: CosmosConfig,

    /// Ingest window settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<(), TapeError> {
        let c = &self.cosmos;
        for (name, value) in [
            ("cosmos.host", &c.host),
            ("cosmos.master_key", &c.master_key),
            ("cosmos.database_id", &c.database_id),
            ("cosmos.container_id", &c.container_id),
        ] {
            if value.trim().is_empty() {
                return Err(TapeError::Config(format!("{name} must not be empty")));
            }
        }
        if !c.partition_key_path.starts_with('/') {
            return Err(TapeError::Config(format!(
                "cosmos.partition_key_path must start with '/': {}",
                c.partition_key_path
            )));
        }
        if c.page_size == 0 {
            return Err(TapeError::Config("cosmos.page_size must be positive".into()));
        }
        if self.stream.channel_capacity == 0 {
            return Err(TapeError::Config("stream.channel_capacity must be positive".into()));
        }
        url::Url::parse(&self.stream.url)
            .map_err(|e| TapeError::Config(format!("stream.url is invalid: {e}")))?;
        url::Url::parse(&c.host)
            .map_err(|e| TapeError::Config(format!("cosmos.host is invalid: {e}")))?;
        Ok(())
    }
}

/// Logging metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_module_name")]
    pub module_name: String,
    pub log_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { module_name: default_module_name(), log_path: None }
    }
}

/// Market data stream configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// WebSocket endpoint, without query parameters.
    #[serde(default = "default_stream_url")]
    pub url: String,

    /// API key appended as the `apikey` query parameter.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Resource patterns to subscribe to (e.g. `"markets:*:trades"`).
    #[serde(default = "default_subscriptions")]
    pub subscriptions: Vec<String>,

    /// WebSocket ping interval in seconds (0 disables pinging).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_sec: u64,

    /// Capacity of the batch channel between the stream and the consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: default_stream_url(),
            api_key: None,
            subscriptions: default_subscriptions(),
            ping_interval_sec: default_ping_interval(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Document database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CosmosConfig {
    /// Account endpoint (e.g. `https://myaccount.documents.azure.com:443/`).
    pub host: String,

    /// Base64-encoded account master key.
    pub master_key: String,

    pub database_id: String,

    pub container_id: String,

    /// Partition key path for a newly created container.
    #[serde(default = "default_partition_key_path")]
    pub partition_key_path: String,

    /// Amount added to the container's provisioned throughput at bootstrap.
    #[serde(default = "default_throughput_increment")]
    pub throughput_increment: i64,

    /// Page-size hint for the readback enumeration.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Ingest window configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long to ingest trades before reading back (seconds).
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { duration_secs: default_duration_secs() }
    }
}

// ---------------------------------------------------------------------------
// Defaults (used by serde)
// ---------------------------------------------------------------------------

fn default_module_name() -> String {
    "tape".into()
}

fn default_stream_url() -> String {
    "wss://stream.cryptowat.ch/connect".into()
}

fn default_subscriptions() -> Vec<String> {
    vec!["markets:*:trades".into()]
}

fn default_ping_interval() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_partition_key_path() -> String {
    "/partitionKey".into()
}

fn default_throughput_increment() -> i64 {
    100
}

fn default_page_size() -> u32 {
    10
}

fn default_user_agent() -> String {
    concat!("tape-sink/", env!("CARGO_PKG_VERSION")).into()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_duration_secs() -> u64 {
    1
}

/// Load, parse and validate a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
