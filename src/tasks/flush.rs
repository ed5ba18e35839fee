//! Oplog Tasks
//!
//! The consumer that drains the mutation handoff channel into the in-memory
//! oplog, and the periodic task that writes the oplog to the log stream.

use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::cache::Operation;

/// Shortest flush period; the runtime's timer cannot do better.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Records accepted but not yet written.
pub type Oplog = Arc<RwLock<Vec<Operation>>>;

/// Spawns the task that moves records from the handoff channel to `oplog`.
///
/// Ends once every sender has been dropped and the channel is drained.
pub fn spawn_oplog_consumer(mut receiver: mpsc::Receiver<Operation>, oplog: Oplog) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(op) = receiver.recv().await {
            oplog.write().await.push(op);
        }
        debug!("oplog channel closed");
    })
}

/// Spawns the task that periodically writes pending records to `sink`.
///
/// Every `interval` the pending records are swapped out for an empty oplog
/// and written one per line; nothing is written when nothing is pending.
/// A failed write rewinds `sink` to where the batch began and puts the
/// batch back for the next tick. When `consumer` finishes, whatever it left behind is written and the
/// task ends.
///
/// # Arguments
/// * `sink` - Log stream, positioned where new records belong
/// * `oplog` - Shared pending-record buffer
/// * `interval` - Flush period, clamped to `MIN_FLUSH_INTERVAL`
/// * `consumer` - Handle of the task feeding `oplog`
pub fn spawn_flush_task<W>(
    mut sink: W,
    oplog: Oplog,
    interval: Duration,
    mut consumer: JoinHandle<()>,
) -> JoinHandle<()>
where
    W: AsyncWrite + AsyncSeek + Unpin + Send + 'static,
{
    let interval = interval.max(MIN_FLUSH_INTERVAL);

    tokio::spawn(async move {
        info!("Starting oplog flush task with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => flush(&mut sink, &oplog).await,
                _ = &mut consumer => {
                    flush(&mut sink, &oplog).await;
                    info!("oplog closed, flush task exiting");
                    break;
                }
            }
        }
    })
}

async fn flush<W>(sink: &mut W, oplog: &Oplog)
where
    W: AsyncWrite + AsyncSeek + Unpin,
{
    let batch = std::mem::take(&mut *oplog.write().await);
    if batch.is_empty() {
        return;
    }

    let mut buf = String::new();
    for op in &batch {
        match op.encode() {
            Ok(line) => {
                buf.push_str(&line);
                buf.push('\n');
            }
            Err(err) => {
                // Already applied to the cache, so the log can no longer match it.
                error!(key = %op.key(), error = %err, "cannot serialize committed operation");
                std::process::abort();
            }
        }
    }

    let start = match sink.stream_position().await {
        Ok(start) => start,
        Err(err) => {
            error!(error = %err, records = batch.len(), "cannot locate oplog end, will retry");
            requeue(oplog, batch).await;
            return;
        }
    };

    let written = async {
        sink.write_all(buf.as_bytes()).await?;
        sink.flush().await
    }
    .await;

    match written {
        Ok(()) => debug!(records = batch.len(), "oplog flushed"),
        Err(err) => {
            error!(error = %err, records = batch.len(), "oplog write failed, will retry");
            // A partial write must not survive in front of the retried batch.
            if let Err(err) = sink.seek(SeekFrom::Start(start)).await {
                error!(error = %err, offset = start, "cannot rewind oplog after failed write");
            }
            requeue(oplog, batch).await;
        }
    }
}

/// Puts `batch` back in front of records queued since it was taken.
async fn requeue(oplog: &Oplog, batch: Vec<Operation>) {
    let mut pending = oplog.write().await;
    let newer = std::mem::replace(&mut *pending, batch);
    pending.extend(newer);
}
