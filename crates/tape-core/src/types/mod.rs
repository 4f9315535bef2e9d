//! Data types received from the market data feed.
//!
//! Field names follow the feed's JSON (camelCase), so a [`Trade`] serializes
//! back into exactly the projection that gets persisted.

pub mod lenient;
pub mod trade;

pub use trade::*;
