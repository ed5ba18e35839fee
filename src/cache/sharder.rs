//! Sharder Module
//!
//! Partitions the keyspace across a fixed set of shards and supplies the
//! per-shard locking that bare stores need.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use futures_util::future::join_all;
use serde_json::Value as Json;
use tokio::sync::RwLock;

use crate::cache::store::Store;
use crate::cache::value::{Entry, Value};
use crate::cache::Cache;
use crate::error::{CacheError, Result};

/// Maps a key to a 32-bit shard hash.
pub type HashFn = fn(&str) -> u32;

// == Default Hash ==
/// 32-bit xxHash of the key bytes.
pub fn default_hash(key: &str) -> u32 {
    xxhash_rust::xxh32::xxh32(key.as_bytes(), 0)
}

// == Shard ==
/// One partition of the keyspace.
enum Shard {
    /// Bare store, always behind the sharder's lock
    Local(RwLock<Store>),
    /// Arbitrary cache, locked only when asked to be
    Delegate {
        cache: Arc<dyn Cache>,
        lock: Option<RwLock<()>>,
    },
}

impl Shard {
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<Entry> {
        match self {
            Shard::Local(store) => store.write().await.set(key, value, ttl),
            Shard::Delegate { cache, lock } => {
                let _guard = match lock {
                    Some(lock) => Some(lock.write().await),
                    None => None,
                };
                cache.set(key, value, ttl).await
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Entry> {
        match self {
            Shard::Local(store) => store.read().await.get(key),
            Shard::Delegate { cache, lock } => {
                let _guard = match lock {
                    Some(lock) => Some(lock.read().await),
                    None => None,
                };
                cache.get(key).await
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match self {
            Shard::Local(store) => {
                store.write().await.remove(key);
                Ok(())
            }
            Shard::Delegate { cache, lock } => {
                let _guard = match lock {
                    Some(lock) => Some(lock.write().await),
                    None => None,
                };
                cache.remove(key).await
            }
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        match self {
            Shard::Local(store) => Ok(store.read().await.keys()),
            Shard::Delegate { cache, lock } => {
                let _guard = match lock {
                    Some(lock) => Some(lock.read().await),
                    None => None,
                };
                cache.keys().await
            }
        }
    }

    async fn get_at_index(&self, key: &str, index: &str) -> Result<Json> {
        match self {
            Shard::Local(store) => store.read().await.get_at_index(key, index),
            Shard::Delegate { cache, lock } => {
                let _guard = match lock {
                    Some(lock) => Some(lock.read().await),
                    None => None,
                };
                cache.get_at_index(key, index).await
            }
        }
    }
}

// == Sharder ==
/// Routes every key to exactly one shard by `hash(key) % shard_count`.
///
/// Writers take the shard's exclusive lock, readers its shared lock. Locks
/// are per shard, so operations on different shards run in parallel.
pub struct Sharder {
    hash: HashFn,
    shards: Vec<Shard>,
}

impl Sharder {
    // == Constructor ==
    /// Creates a sharder over `count` fresh local stores.
    ///
    /// # Arguments
    /// * `count` - Number of shards, at least 1
    /// * `hash` - Shard hash, `default_hash` if None
    pub fn new(count: usize, hash: Option<HashFn>) -> Result<Self> {
        if count < 1 {
            return Err(CacheError::InvalidShardCount);
        }

        let shards = (0..count)
            .map(|_| Shard::Local(RwLock::new(Store::new())))
            .collect();

        Ok(Self {
            hash: hash.unwrap_or(default_hash),
            shards,
        })
    }

    /// Creates a sharder over arbitrary caches.
    ///
    /// Set `need_lock` when the caches do not synchronize themselves; leave
    /// it cleared for caches that do (e.g. `RemoteCache`).
    pub fn over(caches: Vec<Arc<dyn Cache>>, hash: Option<HashFn>, need_lock: bool) -> Result<Self> {
        if caches.is_empty() {
            return Err(CacheError::InvalidShardCount);
        }

        let shards = caches
            .into_iter()
            .map(|cache| Shard::Delegate {
                cache,
                lock: need_lock.then(|| RwLock::new(())),
            })
            .collect();

        Ok(Self {
            hash: hash.unwrap_or(default_hash),
            shards,
        })
    }

    // == Shard Index ==
    /// Returns the shard that owns `key`.
    pub fn shard_index(&self, key: &str) -> usize {
        if self.shards.len() == 1 {
            return 0;
        }
        (self.hash)(key) as usize % self.shards.len()
    }

    /// Returns the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }
}

#[async_trait]
impl Cache for Sharder {
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<Entry> {
        self.shard(key).set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Entry> {
        self.shard(key).get(key).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.shard(key).remove(key).await
    }

    /// Collects keys from every shard concurrently.
    ///
    /// All shards are awaited before returning; if any of them failed the
    /// first failure (in shard order) is returned and the rest discarded.
    async fn keys(&self) -> Result<Vec<String>> {
        let results = join_all(self.shards.iter().map(|shard| shard.keys())).await;

        let mut keys = Vec::new();
        for chunk in results {
            keys.extend(chunk?);
        }
        Ok(keys)
    }

    async fn get_at_index(&self, key: &str, index: &str) -> Result<Json> {
        self.shard(key).get_at_index(key, index).await
    }
}
