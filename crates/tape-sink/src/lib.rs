//! # tape-sink
//!
//! Persistence side of the trade tape sink.
//!
//! - [`cosmos`]: REST client for the document database
//! - [`bootstrap`]: create-or-get database and container, scale throughput
//! - [`ingest`]: per-batch trade handler and the channel consumer loop
//! - [`readback`]: enumerate and report stored documents
//!
//! The handler and reporter only need an [`ItemStore`], so they run against
//! the real container or an in-memory double alike.

pub mod bootstrap;
pub mod cosmos;
pub mod ingest;
pub mod readback;

use async_trait::async_trait;
use serde_json::Value;

use crate::cosmos::CosmosError;

/// Item-level operations on one container.
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Container id, for log lines.
    fn id(&self) -> &str;

    /// Persist a new document. The body must carry an `id`.
    async fn create_item(&self, item: &Value) -> Result<Value, CosmosError>;

    /// Every document in the container, paging with the given size hint.
    async fn read_all_items(&self, max_item_count: u32) -> Result<Vec<Value>, CosmosError>;
}
