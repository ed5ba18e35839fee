//! Active Expiry Task
//!
//! One-shot timer that removes a key once its TTL has elapsed, unless the
//! key has been written again since the timer was scheduled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::Cache;

/// Spawns a timer that removes `key` from `cache` after `delay`.
///
/// `marker` is the expiry timestamp of the entry the timer was scheduled
/// for. On firing, the key is removed only if the live entry still carries
/// that marker; a later Set replaces the marker and turns this timer into a
/// no-op, so overwritten keys never need their timers cancelled.
///
/// # Returns
/// A JoinHandle for the spawned timer.
pub fn spawn_expiry_timer(
    cache: Arc<dyn Cache>,
    key: String,
    marker: i64,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        match cache.get(&key).await {
            Ok(entry) if entry.expires == marker => match cache.remove(&key).await {
                Ok(()) => debug!(key = %key, "expired entry removed"),
                Err(err) => warn!(key = %key, error = %err, "failed to remove expired entry"),
            },
            Ok(_) => debug!(key = %key, "entry rewritten since scheduling, timer skipped"),
            Err(_) => {}
        }
    })
}
