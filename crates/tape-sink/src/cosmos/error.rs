//! Errors returned by the document database client.
//!
//! HTTP failures keep their status code so callers can branch on the class
//! of failure (already exists, bad request, throttled) without string
//! matching.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CosmosError {
    /// The master key is not valid base64.
    #[error("invalid master key: {0}")]
    InvalidKey(String),

    /// The account endpoint could not be parsed or joined.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} ({code}): {message}")]
    Http {
        status: StatusCode,
        /// Server error code, e.g. `"Conflict"`.
        code: String,
        message: String,
        /// `x-ms-retry-after-ms`, present on throttled responses.
        retry_after_ms: Option<u64>,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl CosmosError {
    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Resource already exists (409).
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    /// Bad request (400).
    pub fn is_bad_request(&self) -> bool {
        self.status() == Some(StatusCode::BAD_REQUEST)
    }

    /// Resource not found (404).
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Request rate too large (429).
    pub fn is_throttled(&self) -> bool {
        self.status() == Some(StatusCode::TOO_MANY_REQUESTS)
    }

    /// Server-supplied message, or the display form for non-HTTP errors.
    pub fn message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            code: "NotFound".into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }
}
