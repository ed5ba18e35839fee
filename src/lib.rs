//! Layercache - A layered in-memory key-value cache server
//!
//! Strings, lists and maps behind a stack of composable layers: sharding,
//! TTL expiration, an append-only oplog and call logging.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheBuilder};
pub use client::RemoteCache;
pub use config::{Config, Credentials};
pub use error::{CacheError, Result};
