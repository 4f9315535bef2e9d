//! WebSocket session with auto-reconnect and keep-alive.

pub mod client;

pub use client::{OnBinaryCallback, OnTextCallback, SubscribeTrigger, WsSession, WsSessionConfig};
