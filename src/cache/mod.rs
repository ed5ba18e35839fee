//! Cache Module
//!
//! A key-value cache assembled from interchangeable layers. Every layer
//! implements [`Cache`] and wraps another `Arc<dyn Cache>`:
//!
//! ```text
//! Logger -> Persister -> Ttl -> Sharder -> Store x N
//! ```
//!
//! [`CacheBuilder`] assembles the standard stack.

mod logger;
mod oplog;
mod persister;
pub mod sharder;
mod store;
mod ttl;
pub mod value;


use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value as Json;
use tracing::info;

use crate::config::Config;
use crate::error::{CacheError, Result};

// Re-export public types
pub use logger::Logger;
pub use oplog::{replay, Operation};
pub use persister::{LogStream, Persister, DEFAULT_QUEUE_CAPACITY};
pub use sharder::{default_hash, HashFn, Sharder};
pub use store::Store;
pub use ttl::Ttl;
pub use value::{Entry, Value, ValueKind};

// == Cache ==
/// The contract shared by every layer.
///
/// Implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Stores `value` under `key` and returns the stored entry.
    ///
    /// A zero `ttl` means "unspecified"; a negative one fails with
    /// `InvalidTtl` and leaves the cache untouched.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<Entry>;

    /// Returns the entry under `key`, or `KeyNotFound`.
    async fn get(&self, key: &str) -> Result<Entry>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Returns every key present, in no particular order.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Returns one element of the list or map stored under `key`.
    async fn get_at_index(&self, key: &str, index: &str) -> Result<Json>;
}

// == Cache Builder ==
/// Assembles the standard layer stack.
#[derive(Clone)]
pub struct CacheBuilder {
    default_ttl: Duration,
    shards: usize,
    hash: Option<HashFn>,
    flush_interval: std::time::Duration,
    queue_capacity: usize,
    log_operations: bool,
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self {
            default_ttl: Duration::zero(),
            shards: 1,
            hash: None,
            flush_interval: std::time::Duration::from_millis(500),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_operations: false,
        }
    }
}

impl CacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every cache setting from `config`.
    ///
    /// Fails with `InvalidTtl` when `default_ttl` is too large to represent.
    pub fn from_config(config: &Config) -> Result<Self> {
        let default_ttl =
            Duration::try_seconds(config.default_ttl).ok_or(CacheError::InvalidTtl)?;

        Ok(Self {
            default_ttl,
            shards: config.shards,
            hash: None,
            flush_interval: std::time::Duration::from_millis(config.save_freq_ms),
            queue_capacity: config.queue_capacity,
            log_operations: config.log_operations,
        })
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn shards(mut self, count: usize) -> Self {
        self.shards = count;
        self
    }

    pub fn hash(mut self, hash: HashFn) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn flush_interval(mut self, interval: std::time::Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn log_operations(mut self, enabled: bool) -> Self {
        self.log_operations = enabled;
        self
    }

    // == Build ==
    /// Builds an in-memory cache with no persistence.
    pub async fn build(self) -> Result<Arc<dyn Cache>> {
        self.assemble(None::<tokio::fs::File>).await
    }

    /// Builds a cache persisted to `stream`, replaying it first.
    pub async fn build_with_log<S: LogStream>(self, stream: S) -> Result<Arc<dyn Cache>> {
        self.assemble(Some(stream)).await
    }

    async fn assemble<S: LogStream>(self, stream: Option<S>) -> Result<Arc<dyn Cache>> {
        let durable = stream.is_some();

        let mut cache: Arc<dyn Cache> = Arc::new(Sharder::new(self.shards, self.hash)?);
        cache = Arc::new(Ttl::new(cache, self.default_ttl)?);
        if durable {
            cache = Arc::new(
                Persister::new(cache, stream, self.flush_interval, self.queue_capacity).await?,
            );
        }
        if self.log_operations {
            cache = Arc::new(Logger::new(cache));
        }

        info!(
            "Cache assembled: shards={}, default_ttl={}, durable={}, log_operations={}",
            self.shards, self.default_ttl, durable, self.log_operations
        );
        Ok(cache)
    }
}
