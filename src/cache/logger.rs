//! Logger Module
//!
//! Observability layer: forwards every call unchanged and records the call,
//! its arguments and its outcome through `tracing`.

use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use futures_util::FutureExt;
use serde_json::Value as Json;
use tracing::{error, info};

use crate::cache::value::{Entry, Value};
use crate::cache::Cache;
use crate::error::Result;

// == Logger ==
/// Logs every call made to the wrapped cache.
pub struct Logger {
    inner: Arc<dyn Cache>,
}

impl Logger {
    pub fn new(inner: Arc<dyn Cache>) -> Self {
        Self { inner }
    }
}

/// Runs `call`, logs its outcome and hands it back untouched.
///
/// A panic inside `call` is logged and then resumed.
async fn observe<T, F>(op: &'static str, args: String, call: F) -> Result<T>
where
    T: Debug,
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(outcome) => {
            match &outcome {
                Ok(result) => info!(op, args = %args, result = ?result, "cache call"),
                Err(err) => info!(op, args = %args, error = %err, "cache call failed"),
            }
            outcome
        }
        Err(panic) => {
            error!(op, args = %args, "PANIC in wrapped cache");
            std::panic::resume_unwind(panic)
        }
    }
}

#[async_trait]
impl Cache for Logger {
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<Entry> {
        let args = format!("{} {:?} {}", key, value, ttl);
        observe("set", args, self.inner.set(key, value, ttl)).await
    }

    async fn get(&self, key: &str) -> Result<Entry> {
        observe("get", key.to_string(), self.inner.get(key)).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        observe("remove", key.to_string(), self.inner.remove(key)).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        observe("keys", String::new(), self.inner.keys()).await
    }

    async fn get_at_index(&self, key: &str, index: &str) -> Result<Json> {
        let args = format!("{} {}", key, index);
        observe("get_at_index", args, self.inner.get_at_index(key, index)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Sharder;
    use crate::error::CacheError;

    struct PanickingCache;

    #[async_trait]
    impl Cache for PanickingCache {
        async fn set(&self, _: &str, _: Value, _: Duration) -> Result<Entry> {
            panic!("set exploded")
        }
        async fn get(&self, _: &str) -> Result<Entry> {
            panic!("get exploded")
        }
        async fn remove(&self, _: &str) -> Result<()> {
            panic!("remove exploded")
        }
        async fn keys(&self) -> Result<Vec<String>> {
            panic!("keys exploded")
        }
        async fn get_at_index(&self, _: &str, _: &str) -> Result<Json> {
            panic!("get_at_index exploded")
        }
    }

    #[tokio::test]
    async fn test_passes_results_through() {
        let inner: Arc<dyn Cache> = Arc::new(Sharder::new(2, None).unwrap());
        let logger = Logger::new(inner.clone());

        let list = Value::try_from(serde_json::json!(["a"])).unwrap();
        let stored = logger.set("list", list, Duration::zero()).await.unwrap();
        assert_eq!(logger.get("list").await.unwrap(), stored);
        assert_eq!(logger.get_at_index("list", "0").await.unwrap(), serde_json::json!("a"));
        assert_eq!(logger.keys().await.unwrap(), inner.keys().await.unwrap());

        logger.remove("list").await.unwrap();
        assert!(inner.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_passes_errors_through() {
        let logger = Logger::new(Arc::new(Sharder::new(1, None).unwrap()));

        assert!(matches!(logger.get("missing").await, Err(CacheError::KeyNotFound)));
        assert!(matches!(
            logger.set("k", Value::from("v"), Duration::seconds(-1)).await,
            Err(CacheError::InvalidTtl)
        ));
    }

    #[tokio::test]
    async fn test_panics_are_resumed() {
        let logger = Arc::new(Logger::new(Arc::new(PanickingCache)));

        let joined = tokio::spawn(async move { logger.get("k").await }).await;
        let panic = joined.unwrap_err();
        assert!(panic.is_panic());

        let payload = panic.into_panic();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"get exploded"));
    }
}
