//! Account-level client.
//!
//! [`CosmosClient`] owns the HTTP connection pool and the signing key. Every
//! request goes through [`CosmosClient::send`], which signs it, attaches
//! the protocol headers and turns non-success statuses into
//! [`CosmosError::Http`].
//!
//! | Operation        | Method | Path                 | Resource type |
//! |------------------|--------|----------------------|---------------|
//! | Create database  | POST   | `/dbs`               | `dbs`         |
//! | Get database     | GET    | `/dbs/{db}`          | `dbs`         |
//! | Query offers     | POST   | `/offers`            | `offers`      |
//! | Replace offer    | PUT    | `/offers/{rid}`      | `offers`      |

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tape_core::config::CosmosConfig;
use tracing::debug;

use super::auth::{self, MasterKey};
use super::database::DatabaseClient;
use super::error::CosmosError;
use super::types::{DatabaseProperties, Offer, OfferFeed};

/// REST API version sent as `x-ms-version`.
pub const API_VERSION: &str = "2018-12-31";

struct ClientInner {
    http: reqwest::Client,
    endpoint: url::Url,
    key: MasterKey,
}

/// Handle to one database account. Cheap to clone.
#[derive(Clone)]
pub struct CosmosClient {
    inner: Arc<ClientInner>,
}

impl CosmosClient {
    /// Create a client (no request is made yet).
    pub fn new(
        host: &str,
        master_key: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, CosmosError> {
        let mut endpoint = url::Url::parse(host)
            .map_err(|e| CosmosError::InvalidEndpoint(format!("{host}: {e}")))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        let key = MasterKey::from_base64(master_key)?;

        Ok(Self {
            inner: Arc::new(ClientInner { http, endpoint, key }),
        })
    }

    /// Create a client from the `cosmos` config block.
    pub fn from_config(cfg: &CosmosConfig) -> Result<Self, CosmosError> {
        Self::new(
            &cfg.host,
            &cfg.master_key,
            &cfg.user_agent,
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.inner.endpoint
    }

    // -----------------------------------------------------------------------
    // Databases
    // -----------------------------------------------------------------------

    /// Create a database. Fails with 409 if it already exists.
    pub async fn create_database(&self, id: &str) -> Result<DatabaseClient, CosmosError> {
        let body = json!({ "id": id });
        let resp = self
            .send(Method::POST, "dbs", "dbs", "", |req| req.json(&body))
            .await?;
        let props: DatabaseProperties = decode(resp).await?;
        Ok(DatabaseClient::new(self.clone(), props.id))
    }

    /// Fetch an existing database.
    pub async fn get_database(&self, id: &str) -> Result<DatabaseClient, CosmosError> {
        let link = format!("dbs/{id}");
        let path = format!("dbs/{}", urlencoding::encode(id));
        let resp = self.send(Method::GET, &path, "dbs", &link, |req| req).await?;
        let props: DatabaseProperties = decode(resp).await?;
        Ok(DatabaseClient::new(self.clone(), props.id))
    }

    /// Handle to a database without contacting the server.
    pub fn database_client(&self, id: &str) -> DatabaseClient {
        DatabaseClient::new(self.clone(), id.to_string())
    }

    // -----------------------------------------------------------------------
    // Offers
    // -----------------------------------------------------------------------

    /// Find the offer attached to the resource with `_self` link `resource`.
    pub(crate) async fn query_offer(&self, resource: &str) -> Result<Offer, CosmosError> {
        let query = json!({
            "query": "SELECT * FROM root r WHERE r.resource = @link",
            "parameters": [{ "name": "@link", "value": resource }],
        });
        let resp = self
            .send(Method::POST, "offers", "offers", "", |req| {
                req.header("x-ms-documentdb-isquery", "True")
                    .header(reqwest::header::CONTENT_TYPE, "application/query+json")
                    .body(query.to_string())
            })
            .await?;

        let feed: OfferFeed = decode(resp).await?;
        feed.offers
            .into_iter()
            .next()
            .ok_or_else(|| CosmosError::not_found(format!("could not find offer for {resource}")))
    }

    /// Replace an offer with new content.
    pub(crate) async fn replace_offer(&self, offer: &Offer) -> Result<Offer, CosmosError> {
        let path = format!("offers/{}", urlencoding::encode(&offer.rid));
        let link = offer.rid.to_lowercase();
        let resp = self
            .send(Method::PUT, &path, "offers", &link, |req| req.json(offer))
            .await?;
        decode(resp).await
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Sign and send one request; non-success statuses become errors.
    ///
    /// `path` is relative to the endpoint and already percent-encoded;
    /// `resource_link` is the unencoded link that gets signed.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        resource_type: &str,
        resource_link: &str,
        configure: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, CosmosError> {
        let url = self
            .inner
            .endpoint
            .join(path)
            .map_err(|e| CosmosError::InvalidEndpoint(format!("{path}: {e}")))?;
        let date = auth::rfc1123_now();
        let token = auth::authorization_token(
            &self.inner.key,
            method.as_str(),
            resource_type,
            resource_link,
            &date,
        );

        let request = self
            .inner
            .http
            .request(method.clone(), url)
            .header(reqwest::header::AUTHORIZATION, token)
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header(reqwest::header::ACCEPT, "application/json");

        let resp = configure(request).send().await?;
        debug!("[cosmos] {method} /{path} -> {}", resp.status());
        check_status(resp).await
    }
}

impl std::fmt::Debug for CosmosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish()
    }
}

/// Map a non-success response to [`CosmosError::Http`].
async fn check_status(resp: Response) -> Result<Response, CosmosError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after_ms = resp
        .headers()
        .get("x-ms-retry-after-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok());
    let body = resp.text().await.unwrap_or_default();

    let (code, message) = match serde_json::from_str::<Value>(&body) {
        Ok(v) => (
            v.get("code").and_then(Value::as_str).map(str::to_string),
            v.get("message").and_then(Value::as_str).map(str::to_string),
        ),
        Err(_) => (None, None),
    };

    let code = code.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string()
    });
    Err(CosmosError::Http {
        status,
        code,
        message: message.unwrap_or(body),
        retry_after_ms,
    })
}

/// Deserialize a JSON response body.
pub(crate) async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, CosmosError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| CosmosError::Decode(e.to_string()))
}
