//! Document database REST client.
//!
//! Talks to the Cosmos DB SQL API directly over HTTPS with master-key
//! authorization. Covers only what the sink needs:
//!
//! ```text
//! CosmosClient          (endpoint, key, HTTP pool)
//! ├── DatabaseClient    create/get container
//! └── ContainerClient   create item, read feed, read/replace offer
//! ```
//!
//! No request is retried here; throttled responses surface as
//! [`CosmosError::Http`] with status 429 and the server's retry hint.

pub mod auth;
pub mod client;
pub mod container;
pub mod database;
pub mod error;
pub mod types;

pub use client::CosmosClient;
pub use container::ContainerClient;
pub use database::DatabaseClient;
pub use error::CosmosError;
pub use types::{FeedPage, Offer, PartitionKey};
