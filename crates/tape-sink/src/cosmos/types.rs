//! Resource bodies exchanged with the database REST API.
//!
//! System properties (`_rid`, `_self`, ...) are kept as named fields where
//! the client needs them; everything else round-trips through `extra` so a
//! replace call sends back what the server handed out.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Partition key definition of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKey {
    pub paths: Vec<String>,
    #[serde(default = "default_kind")]
    pub kind: String,
}

impl PartitionKey {
    /// Single-path hash partitioning.
    pub fn hash(path: impl Into<String>) -> Self {
        Self { paths: vec![path.into()], kind: default_kind() }
    }

    /// First (and for hash partitioning, only) path.
    pub fn path(&self) -> Option<&str> {
        self.paths.first().map(String::as_str)
    }
}

fn default_kind() -> String {
    "Hash".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseProperties {
    pub id: String,
    #[serde(rename = "_rid", default)]
    pub rid: String,
    #[serde(rename = "_self", default)]
    pub self_link: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerProperties {
    pub id: String,
    #[serde(rename = "partitionKey", default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKey>,
    #[serde(rename = "_rid", default)]
    pub rid: String,
    #[serde(rename = "_self", default)]
    pub self_link: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provisioned throughput setting of a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    #[serde(rename = "_rid", default)]
    pub rid: String,
    /// `_self` link of the resource the offer applies to.
    #[serde(default)]
    pub resource: String,
    #[serde(rename = "offerResourceId", default)]
    pub offer_resource_id: String,
    #[serde(rename = "offerVersion", default)]
    pub offer_version: String,
    #[serde(default)]
    pub content: OfferContent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Offer {
    /// Manually provisioned request units per second, if any.
    ///
    /// `None` for autoscale offers, which describe throughput differently.
    pub fn throughput(&self) -> Option<i64> {
        self.content.offer_throughput
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferContent {
    #[serde(rename = "offerThroughput", default, skip_serializing_if = "Option::is_none")]
    pub offer_throughput: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of a read-feed enumeration.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub items: Vec<Value>,
    /// Token for the next page; `None` on the last page.
    pub continuation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentFeed {
    #[serde(rename = "Documents", default)]
    pub documents: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfferFeed {
    #[serde(rename = "Offers", default)]
    pub offers: Vec<Offer>,
}
