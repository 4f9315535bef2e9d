//! Database-level operations.

use reqwest::Method;
use serde_json::json;

use super::client::{CosmosClient, decode};
use super::container::ContainerClient;
use super::error::CosmosError;
use super::types::{ContainerProperties, PartitionKey};

/// Handle to one database.
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    client: CosmosClient,
    id: String,
}

impl DatabaseClient {
    pub(crate) fn new(client: CosmosClient, id: String) -> Self {
        Self { client, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resource link, e.g. `dbs/tape`.
    pub fn link(&self) -> String {
        format!("dbs/{}", self.id)
    }

    fn path(&self) -> String {
        format!("dbs/{}", urlencoding::encode(&self.id))
    }

    /// Create a container. Fails with 409 if it already exists.
    pub async fn create_container(
        &self,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<ContainerClient, CosmosError> {
        let path = format!("{}/colls", self.path());
        let body = json!({ "id": id, "partitionKey": partition_key });
        let resp = self
            .client
            .send(Method::POST, &path, "colls", &self.link(), |req| req.json(&body))
            .await?;
        let props: ContainerProperties = decode(resp).await?;
        Ok(ContainerClient::new(self.client.clone(), self.id.clone(), props))
    }

    /// Fetch an existing container (its properties carry the partition key).
    pub async fn get_container(&self, id: &str) -> Result<ContainerClient, CosmosError> {
        let path = format!("{}/colls/{}", self.path(), urlencoding::encode(id));
        let link = format!("{}/colls/{id}", self.link());
        let resp = self.client.send(Method::GET, &path, "colls", &link, |req| req).await?;
        let props: ContainerProperties = decode(resp).await?;
        Ok(ContainerClient::new(self.client.clone(), self.id.clone(), props))
    }
}
