//! Typed error definitions shared across the workspace.
//!
//! [`TapeError`] covers failures that happen before or around the database
//! session. Database errors have their own type in `tape-sink` because they
//! carry HTTP status information the bootstrapper branches on.

use thiserror::Error;

/// Domain-specific errors for the trade tape sink.
#[derive(Debug, Error)]
pub enum TapeError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// WebSocket connection, handshake, or lifecycle error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Feed message parsing error.
    #[error("parse error: {0}")]
    Parse(String),
}
