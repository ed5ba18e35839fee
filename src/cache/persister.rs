//! Persister Module
//!
//! Durability layer: committed mutations are handed to a consumer task,
//! buffered in an oplog and periodically appended to a log stream, which is
//! replayed on startup.

use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as Json;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use crate::cache::oplog::{self, Operation};
use crate::cache::sharder::default_hash;
use crate::cache::value::{Entry, Value};
use crate::cache::Cache;
use crate::error::Result;
use crate::tasks::{spawn_flush_task, spawn_oplog_consumer, Oplog};

/// Number of ordering locks shared out among keys.
const ORDER_STRIPES: usize = 64;

/// Default capacity of the mutation handoff channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// == Log Stream ==
/// A readable, writable, seekable byte stream holding the oplog.
pub trait LogStream: AsyncRead + AsyncWrite + AsyncSeek + Unpin + Send + 'static {}

impl<T> LogStream for T where T: AsyncRead + AsyncWrite + AsyncSeek + Unpin + Send + 'static {}

// == Journal ==
/// Producer side of the oplog.
struct Journal {
    sender: mpsc::Sender<Operation>,
    /// Held from "mutate" to "enqueued" so one key's records keep the order
    /// in which its mutations completed
    stripes: Vec<Mutex<()>>,
}

impl Journal {
    fn stripe(&self, key: &str) -> &Mutex<()> {
        &self.stripes[default_hash(key) as usize % self.stripes.len()]
    }

    async fn record(&self, op: Operation) {
        if let Err(mpsc::error::SendError(op)) = self.sender.send(op).await {
            error!(key = %op.key(), "oplog consumer is gone, record dropped");
        }
    }
}

// == Persister ==
/// Records every successful Set and Remove of the wrapped cache.
///
/// Without a log stream the persister is a plain passthrough.
pub struct Persister {
    inner: Arc<dyn Cache>,
    journal: Option<Journal>,
}

impl Persister {
    // == Constructor ==
    /// Wraps `inner`, replaying `stream` into it first.
    ///
    /// # Arguments
    /// * `inner` - Cache to make durable
    /// * `stream` - Log source and sink; None disables persistence
    /// * `flush_interval` - How often pending records are written
    /// * `queue_capacity` - Bound of the mutation handoff channel
    ///
    /// # Errors
    /// Fails if the log holds a malformed record or an unknown operation,
    /// or if the stream cannot be read or repositioned.
    pub async fn new<S: LogStream>(
        inner: Arc<dyn Cache>,
        stream: Option<S>,
        flush_interval: Duration,
        queue_capacity: usize,
    ) -> Result<Self> {
        let Some(mut stream) = stream else {
            return Ok(Self {
                inner,
                journal: None,
            });
        };

        let resume_at = {
            let mut reader = BufReader::new(&mut stream);
            oplog::replay(&mut reader, inner.as_ref()).await?
        };
        stream.seek(SeekFrom::Start(resume_at)).await?;

        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let pending = Oplog::default();
        let consumer = spawn_oplog_consumer(receiver, pending.clone());
        spawn_flush_task(stream, pending, flush_interval, consumer);

        info!(
            "Persistence enabled: flush_interval={:?}, queue_capacity={}",
            flush_interval, queue_capacity
        );

        Ok(Self {
            inner,
            journal: Some(Journal {
                sender,
                stripes: (0..ORDER_STRIPES).map(|_| Mutex::new(())).collect(),
            }),
        })
    }

    /// Returns true if mutations are being logged.
    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }
}

#[async_trait]
impl Cache for Persister {
    async fn set(&self, key: &str, value: Value, ttl: chrono::Duration) -> Result<Entry> {
        let Some(journal) = &self.journal else {
            return self.inner.set(key, value, ttl).await;
        };

        let _order = journal.stripe(key).lock().await;
        let entry = self.inner.set(key, value, ttl).await?;
        journal
            .record(Operation::Set {
                key: key.to_string(),
                value: entry.data.clone(),
                expires: entry.expires,
            })
            .await;
        Ok(entry)
    }

    async fn get(&self, key: &str) -> Result<Entry> {
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let Some(journal) = &self.journal else {
            return self.inner.remove(key).await;
        };

        let _order = journal.stripe(key).lock().await;
        self.inner.remove(key).await?;
        journal
            .record(Operation::Remove {
                key: key.to_string(),
            })
            .await;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn get_at_index(&self, key: &str, index: &str) -> Result<Json> {
        self.inner.get_at_index(key, index).await
    }
}
