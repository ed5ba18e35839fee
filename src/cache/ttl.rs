//! TTL Module
//!
//! Expiration layer. Reads check expiry lazily; every Set with a positive
//! delay also schedules a one-shot removal timer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use futures_util::future::join_all;
use serde_json::Value as Json;

use crate::cache::value::{current_timestamp_ns, Entry, Value};
use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_expiry_timer;

// == Ttl ==
/// Adds expiration semantics to any cache.
pub struct Ttl {
    inner: Arc<dyn Cache>,
    /// Applied when a Set passes a zero TTL; zero here means no default
    default_ttl: Duration,
}

impl Ttl {
    // == Constructor ==
    /// Wraps `inner` with expiration.
    ///
    /// Fails with `InvalidTtl` if `default_ttl` is negative.
    pub fn new(inner: Arc<dyn Cache>, default_ttl: Duration) -> Result<Self> {
        if default_ttl < Duration::zero() {
            return Err(CacheError::InvalidTtl);
        }
        Ok(Self { inner, default_ttl })
    }

    /// Returns the configured default TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn resolve(&self, ttl: Duration) -> Result<Duration> {
        if ttl < Duration::zero() {
            return Err(CacheError::InvalidTtl);
        }
        if ttl == Duration::zero() {
            return Ok(self.default_ttl);
        }
        Ok(ttl)
    }
}

#[async_trait]
impl Cache for Ttl {
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<Entry> {
        let delay = self.resolve(ttl)?;
        let entry = self.inner.set(key, value, delay).await?;

        if delay > Duration::zero() {
            if let Ok(delay) = delay.to_std() {
                spawn_expiry_timer(self.inner.clone(), key.to_string(), entry.expires, delay);
            }
        }
        Ok(entry)
    }

    async fn get(&self, key: &str) -> Result<Entry> {
        let entry = self.inner.get(key).await?;
        if entry.is_expired() {
            return Err(CacheError::KeyNotFound);
        }
        Ok(entry)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }

    /// Returns the keys whose entries have not expired.
    async fn keys(&self) -> Result<Vec<String>> {
        let keys = self.inner.keys().await?;
        let entries = join_all(keys.iter().map(|key| self.inner.get(key))).await;
        let now = current_timestamp_ns();

        let mut live = Vec::with_capacity(keys.len());
        for (key, entry) in keys.into_iter().zip(entries) {
            match entry {
                Ok(entry) if !entry.is_expired_at(now) => live.push(key),
                // Expired, or removed since the listing was taken
                Ok(_) | Err(CacheError::KeyNotFound) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(live)
    }

    async fn get_at_index(&self, key: &str, index: &str) -> Result<Json> {
        self.get(key).await?;
        self.inner.get_at_index(key, index).await
    }
}
