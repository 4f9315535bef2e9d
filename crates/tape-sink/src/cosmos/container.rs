//! Container-level operations: items and throughput.
//!
//! | Operation         | Method | Path                          |
//! |-------------------|--------|-------------------------------|
//! | Create item       | POST   | `/dbs/{db}/colls/{c}/docs`    |
//! | Read feed (page)  | GET    | `/dbs/{db}/colls/{c}/docs`    |
//! | Read offer        | POST   | `/offers` (query)             |
//! | Replace offer     | PUT    | `/offers/{rid}`               |

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use super::client::{CosmosClient, decode};
use super::error::CosmosError;
use super::types::{ContainerProperties, DocumentFeed, FeedPage, Offer};
use crate::ItemStore;

/// Partition key value used when a document lacks the partition field.
const UNDEFINED_PARTITION_KEY: &str = "[{}]";

/// Handle to one container.
#[derive(Debug, Clone)]
pub struct ContainerClient {
    client: CosmosClient,
    database_id: String,
    properties: ContainerProperties,
}

impl ContainerClient {
    pub(crate) fn new(
        client: CosmosClient,
        database_id: String,
        properties: ContainerProperties,
    ) -> Self {
        Self { client, database_id, properties }
    }

    pub fn id(&self) -> &str {
        &self.properties.id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn properties(&self) -> &ContainerProperties {
        &self.properties
    }

    pub fn partition_key_path(&self) -> Option<&str> {
        self.properties.partition_key.as_ref().and_then(|pk| pk.path())
    }

    /// Resource link, e.g. `dbs/tape/colls/trades`.
    pub fn link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database_id, self.properties.id)
    }

    fn docs_path(&self) -> String {
        format!(
            "dbs/{}/colls/{}/docs",
            urlencoding::encode(&self.database_id),
            urlencoding::encode(&self.properties.id)
        )
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Create a new document. The body must carry an `id`.
    pub async fn create_item(&self, item: &Value) -> Result<Value, CosmosError> {
        let pk_header = partition_key_header(self.partition_key_path(), item);
        let resp = self
            .client
            .send(Method::POST, &self.docs_path(), "docs", &self.link(), |req| {
                let req = req.json(item);
                match pk_header {
                    Some(value) => req.header("x-ms-documentdb-partitionkey", value),
                    None => req,
                }
            })
            .await?;
        decode(resp).await
    }

    /// Read one page of the document feed.
    ///
    /// `max_item_count` is a hint; the server may return fewer items.
    pub async fn read_feed_page(
        &self,
        max_item_count: u32,
        continuation: Option<&str>,
    ) -> Result<FeedPage, CosmosError> {
        let resp = self
            .client
            .send(Method::GET, &self.docs_path(), "docs", &self.link(), |req| {
                let req = req
                    .header("x-ms-max-item-count", max_item_count.to_string())
                    .header("x-ms-documentdb-query-enablecrosspartition", "True");
                match continuation {
                    Some(token) => req.header("x-ms-continuation", token),
                    None => req,
                }
            })
            .await?;

        let next = resp
            .headers()
            .get("x-ms-continuation")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let feed: DocumentFeed = decode(resp).await?;

        Ok(FeedPage { items: feed.documents, continuation: next })
    }

    /// Read every document, following continuation tokens.
    pub async fn read_all_items(&self, max_item_count: u32) -> Result<Vec<Value>, CosmosError> {
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self.read_feed_page(max_item_count, continuation.as_deref()).await?;
            pages += 1;
            items.extend(page.items);
            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        debug!("[{}] read {} item(s) in {pages} page(s)", self.id(), items.len());
        Ok(items)
    }

    // -----------------------------------------------------------------------
    // Throughput
    // -----------------------------------------------------------------------

    /// Read the container's throughput offer.
    pub async fn read_offer(&self) -> Result<Offer, CosmosError> {
        if self.properties.self_link.is_empty() {
            return Err(CosmosError::Decode(format!("container {} has no _self link", self.id())));
        }
        self.client.query_offer(&self.properties.self_link).await
    }

    /// Set the container's provisioned throughput, returning the new offer.
    pub async fn replace_throughput(
        &self,
        offer: &Offer,
        throughput: i64,
    ) -> Result<Offer, CosmosError> {
        let mut updated = offer.clone();
        updated.content.offer_throughput = Some(throughput);
        self.client.replace_offer(&updated).await
    }
}

#[async_trait]
impl ItemStore for ContainerClient {
    fn id(&self) -> &str {
        ContainerClient::id(self)
    }

    async fn create_item(&self, item: &Value) -> Result<Value, CosmosError> {
        ContainerClient::create_item(self, item).await
    }

    async fn read_all_items(&self, max_item_count: u32) -> Result<Vec<Value>, CosmosError> {
        ContainerClient::read_all_items(self, max_item_count).await
    }
}

/// `x-ms-documentdb-partitionkey` value for a document.
///
/// `None` for containers without a partition key definition.
pub fn partition_key_header(path: Option<&str>, item: &Value) -> Option<String> {
    let path = path?;
    Some(match item.pointer(path) {
        Some(value) => Value::Array(vec![value.clone()]).to_string(),
        None => UNDEFINED_PARTITION_KEY.to_string(),
    })
}
