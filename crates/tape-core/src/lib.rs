//! # tape-core
//!
//! Shared building blocks for the trade tape sink:
//!
//! - **Configuration** (`config`): JSON config deserialization and validation
//! - **Error types** (`error`): domain-specific `TapeError` via thiserror
//! - **Logging** (`logging`): tracing-based structured logging
//! - **Types** (`types`): trade and market identifiers received from the feed
//! - **WebSocket** (`ws`): WS session with auto-reconnect and keep-alive

pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod ws;

pub use types::*;
