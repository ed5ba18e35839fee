//! Oplog Module
//!
//! The durable operation record and startup replay.
//!
//! One JSON object per line:
//!
//! ```text
//! {"Type":"Set","k":"foo","v":"bar","e":0}
//! {"Type":"Remove","k":"foo"}
//! ```
//!
//! `e` is an absolute expiry in Unix nanoseconds, 0 for none.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::cache::value::{current_timestamp_ns, Value};
use crate::cache::Cache;
use crate::error::{CacheError, Result};

// == Operation ==
/// A committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Set {
        key: String,
        value: Value,
        expires: i64,
    },
    Remove {
        key: String,
    },
}

#[derive(Serialize)]
struct RecordOut<'a> {
    #[serde(rename = "Type")]
    kind: &'static str,
    #[serde(rename = "k")]
    key: &'a str,
    #[serde(rename = "v", skip_serializing_if = "Option::is_none")]
    value: Option<&'a Value>,
    #[serde(rename = "e", skip_serializing_if = "Option::is_none")]
    expires: Option<i64>,
}

#[derive(Deserialize)]
struct RecordIn {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "k")]
    key: String,
    #[serde(rename = "v", default)]
    value: Option<Value>,
    #[serde(rename = "e", default)]
    expires: i64,
}

impl Operation {
    /// Returns the key this operation touches.
    pub fn key(&self) -> &str {
        match self {
            Operation::Set { key, .. } | Operation::Remove { key } => key,
        }
    }

    // == Encode ==
    /// Serializes the operation as one log line, without the newline.
    pub fn encode(&self) -> std::result::Result<String, serde_json::Error> {
        let record = match self {
            Operation::Set {
                key,
                value,
                expires,
            } => RecordOut {
                kind: "Set",
                key,
                value: Some(value),
                expires: Some(*expires),
            },
            Operation::Remove { key } => RecordOut {
                kind: "Remove",
                key,
                value: None,
                expires: None,
            },
        };
        serde_json::to_string(&record)
    }

    // == Decode ==
    /// Parses one log line. `line` is the 1-based line number, for errors.
    pub fn decode(bytes: &[u8], line: usize) -> Result<Self> {
        let record: RecordIn = serde_json::from_slice(bytes)
            .map_err(|source| CacheError::MalformedLogRecord { line, source })?;

        match record.kind.as_str() {
            "Set" => {
                let value = record.value.ok_or_else(|| CacheError::MalformedLogRecord {
                    line,
                    source: serde::de::Error::missing_field("v"),
                })?;
                Ok(Operation::Set {
                    key: record.key,
                    value,
                    expires: record.expires,
                })
            }
            "Remove" => Ok(Operation::Remove { key: record.key }),
            _ => Err(CacheError::UnknownOperationKind(record.kind)),
        }
    }

    // == Apply ==
    /// Re-applies the operation against `target`.
    ///
    /// A Set whose absolute expiry has already passed removes the key
    /// instead; otherwise the remaining lifetime is passed on as its TTL.
    pub async fn apply(self, target: &dyn Cache) -> Result<()> {
        match self {
            Operation::Set {
                key,
                value,
                expires,
            } => {
                let ttl = if expires == 0 {
                    Duration::zero()
                } else {
                    let now = current_timestamp_ns();
                    if now >= expires {
                        debug!(key = %key, "record expired before replay, dropping");
                        return target.remove(&key).await;
                    }
                    Duration::nanoseconds(expires - now)
                };
                target.set(&key, value, ttl).await.map(|_| ())
            }
            Operation::Remove { key } => target.remove(&key).await,
        }
    }
}

// == Replay ==
/// Applies every complete record from `reader` to `target`, in order.
///
/// Returns the byte offset just past the last complete line. An
/// unterminated final line is a write torn by a crash: it is ignored, and
/// the returned offset points at its start so the next write replaces it.
pub async fn replay<R>(reader: &mut R, target: &dyn Cache) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut offset: u64 = 0;
    let mut line = 0usize;
    let mut applied = 0usize;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).await?;
        if read == 0 {
            break;
        }
        line += 1;

        if buf.last() != Some(&b'\n') {
            warn!(line, bytes = read, "ignoring torn record at end of log");
            break;
        }
        offset += read as u64;

        let record = &buf[..buf.len() - 1];
        if record.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        Operation::decode(record, line)?.apply(target).await?;
        applied += 1;
    }

    info!(records = applied, "oplog replayed");
    Ok(offset)
}
