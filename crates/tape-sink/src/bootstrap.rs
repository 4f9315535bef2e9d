//! Session bootstrap: make sure the database and container exist, then bump
//! the container's provisioned throughput.
//!
//! Both create calls are idempotent from the caller's point of view: a 409
//! means the resource is already there and the existing one is used.

use tape_core::config::CosmosConfig;
use tracing::{info, warn};

use crate::cosmos::{ContainerClient, CosmosClient, CosmosError, DatabaseClient, PartitionKey};

/// Create the database, or fall back to the existing one on conflict.
pub async fn create_database_if_not_exists(
    client: &CosmosClient,
    id: &str,
) -> Result<DatabaseClient, CosmosError> {
    match client.create_database(id).await {
        Ok(db) => {
            info!("Database with id '{id}' created");
            Ok(db)
        }
        Err(e) if e.is_conflict() => {
            info!("Database with id '{id}' was found");
            Ok(client.database_client(id))
        }
        Err(e) => Err(e),
    }
}

/// Create the container, or fetch the existing one on conflict.
///
/// The existing container is fetched rather than assumed so its `_self`
/// link and partition key definition are known.
pub async fn create_container_if_not_exists(
    db: &DatabaseClient,
    id: &str,
    partition_key: &PartitionKey,
) -> Result<ContainerClient, CosmosError> {
    match db.create_container(id, partition_key).await {
        Ok(container) => {
            info!("Container with id '{id}' created");
            Ok(container)
        }
        Err(e) if e.is_conflict() => {
            let container = db.get_container(id).await?;
            info!("Container with id '{id}' was found");
            if container.partition_key_path() != partition_key.path() {
                warn!(
                    "Container '{id}' is partitioned on {:?}, configured path is {:?}",
                    container.partition_key_path(),
                    partition_key.path()
                );
            }
            Ok(container)
        }
        Err(e) => Err(e),
    }
}

/// Raise the container's throughput by `increment`.
///
/// Returns the new throughput, or `None` when scaling was skipped: the
/// offer could not be read or replaced with a 400, or it carries no manual
/// throughput. Every other error is returned.
pub async fn scale_container(
    container: &ContainerClient,
    increment: i64,
) -> Result<Option<i64>, CosmosError> {
    info!("Scaling container '{}'", container.id());

    match try_scale(container, increment).await {
        Ok(scaled) => Ok(scaled),
        Err(e) if e.is_bad_request() => {
            warn!("Cannot read container throughput: {}", e.message());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn try_scale(
    container: &ContainerClient,
    increment: i64,
) -> Result<Option<i64>, CosmosError> {
    let offer = container.read_offer().await?;
    let Some(current) = offer.throughput() else {
        warn!("Offer {} has no manual throughput (autoscale?), leaving it unchanged", offer.id);
        return Ok(None);
    };
    info!("Found Offer and its throughput is '{current}'");

    let target = current.saturating_add(increment);
    let replaced = container.replace_throughput(&offer, target).await?;
    let now = replaced.throughput().unwrap_or(target);
    info!("Replaced Offer. Offer Throughput is now '{now}'");
    Ok(Some(now))
}

/// Run the full bootstrap sequence and return the ready container.
pub async fn bootstrap(
    client: &CosmosClient,
    cfg: &CosmosConfig,
) -> Result<ContainerClient, CosmosError> {
    let db = create_database_if_not_exists(client, &cfg.database_id).await?;
    let partition_key = PartitionKey::hash(cfg.partition_key_path.as_str());
    let container = create_container_if_not_exists(&db, &cfg.container_id, &partition_key).await?;
    scale_container(&container, cfg.throughput_increment).await?;
    Ok(container)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::cosmos::client::tests::{TEST_KEY, test_client};

    fn cfg(server: &MockServer) -> CosmosConfig {
        serde_json::from_value(json!({
            "host": server.uri(),
            "master_key": TEST_KEY,
            "database_id": "tape",
            "container_id": "trades"
        }))
        .unwrap()
    }

    fn container_body() -> Value {
        json!({
            "id": "trades",
            "partitionKey": { "paths": ["/partitionKey"], "kind": "Hash" },
            "_rid": "AAAAAA==",
            "_self": "dbs/AAAA==/colls/AAAAAA==/"
        })
    }

    fn offer_body(throughput: i64) -> Value {
        json!({
            "id": "oFfEr", "_rid": "oFfEr", "offerVersion": "V2",
            "resource": "dbs/AAAA==/colls/AAAAAA==/", "offerResourceId": "AAAAAA==",
            "content": { "offerThroughput": throughput }
        })
    }

    fn failure(status: u16, code: &str, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(json!({ "code": code, "message": message }))
    }

    fn conflict() -> ResponseTemplate {
        failure(409, "Conflict", "already exists")
    }

    fn offers(list: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "Offers": list }))
    }

    async fn mount_created(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/dbs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "tape" })))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dbs/tape/colls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(container_body()))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_offer_read(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/offers"))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fresh_account_creates_everything_and_scales() {
        let server = MockServer::start().await;
        mount_created(&server).await;
        mount_offer_read(&server, offers(json!([offer_body(400)]))).await;
        Mock::given(method("PUT"))
            .and(path("/offers/oFfEr"))
            .and(body_partial_json(json!({ "content": { "offerThroughput": 500 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(offer_body(500)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let container = bootstrap(&client, &cfg(&server)).await.unwrap();
        assert_eq!(container.id(), "trades");
        assert_eq!(container.database_id(), "tape");
    }

    #[tokio::test]
    async fn existing_resources_are_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dbs"))
            .respond_with(conflict())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dbs/tape/colls"))
            .respond_with(conflict())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dbs/tape/colls/trades"))
            .respond_with(ResponseTemplate::new(200).set_body_json(container_body()))
            .expect(1)
            .mount(&server)
            .await;
        mount_offer_read(&server, offers(json!([offer_body(400)]))).await;
        Mock::given(method("PUT"))
            .and(path("/offers/oFfEr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(offer_body(500)))
            .expect(1)
            .mount(&server)
            .await;

        let container = bootstrap(&test_client(&server), &cfg(&server)).await.unwrap();
        assert_eq!(container.partition_key_path(), Some("/partitionKey"));
    }

    #[tokio::test]
    async fn bad_request_on_offer_is_tolerated() {
        let server = MockServer::start().await;
        mount_created(&server).await;
        mount_offer_read(&server, failure(400, "BadRequest", "serverless account")).await;

        let container = bootstrap(&test_client(&server), &cfg(&server)).await.unwrap();
        assert_eq!(container.id(), "trades");
    }

    #[tokio::test]
    async fn server_error_on_offer_aborts_bootstrap() {
        let server = MockServer::start().await;
        mount_created(&server).await;
        mount_offer_read(&server, ResponseTemplate::new(500).set_body_string("boom")).await;

        let err = bootstrap(&test_client(&server), &cfg(&server)).await.unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
    }

    async fn mount_offer_replace(server: &MockServer, response: ResponseTemplate) {
        mount_offer_read(server, offers(json!([offer_body(400)]))).await;
        Mock::given(method("PUT"))
            .and(path("/offers/oFfEr"))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn bad_request_on_replace_skips_scaling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dbs/tape/colls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(container_body()))
            .mount(&server)
            .await;
        mount_offer_replace(&server, failure(400, "BadRequest", "below minimum")).await;

        let client = test_client(&server);
        let container = client
            .database_client("tape")
            .create_container("trades", &PartitionKey::hash("/partitionKey"))
            .await
            .unwrap();
        assert_eq!(scale_container(&container, 100).await.unwrap(), None);
    }

    #[tokio::test]
    async fn bad_request_on_replace_keeps_bootstrap_going() {
        let server = MockServer::start().await;
        mount_created(&server).await;
        mount_offer_replace(&server, failure(400, "BadRequest", "below minimum")).await;

        let container = bootstrap(&test_client(&server), &cfg(&server)).await.unwrap();
        assert_eq!(container.id(), "trades");
    }

    #[tokio::test]
    async fn server_error_on_replace_aborts_bootstrap() {
        let server = MockServer::start().await;
        mount_created(&server).await;
        mount_offer_replace(&server, ResponseTemplate::new(500).set_body_string("boom")).await;

        let err = bootstrap(&test_client(&server), &cfg(&server)).await.unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn missing_offer_aborts_bootstrap() {
        let server = MockServer::start().await;
        mount_created(&server).await;
        mount_offer_read(&server, offers(json!([]))).await;

        let err = bootstrap(&test_client(&server), &cfg(&server)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn autoscale_offer_is_left_alone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dbs/tape/colls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(container_body()))
            .mount(&server)
            .await;
        let autoscale = json!({
            "id": "oFfEr", "_rid": "oFfEr", "resource": "dbs/AAAA==/colls/AAAAAA==/",
            "content": { "offerAutopilotSettings": { "maxThroughput": 4000 } }
        });
        mount_offer_read(&server, offers(json!([autoscale]))).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let db = client.database_client("tape");
        let container = db
            .create_container("trades", &PartitionKey::hash("/partitionKey"))
            .await
            .unwrap();
        assert_eq!(scale_container(&container, 100).await.unwrap(), None);
    }

    #[tokio::test]
    async fn database_create_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dbs"))
            .respond_with(failure(401, "Unauthorized", "bad sig"))
            .mount(&server)
            .await;

        let err = bootstrap(&test_client(&server), &cfg(&server)).await.unwrap_err();
        assert_eq!(err.message(), "bad sig");
    }
}
