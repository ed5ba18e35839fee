//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Index Fault ==
/// Why a structural lookup failed.
///
/// Kept for diagnostics only; every fault surfaces with the same
/// `IndexAccess` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFault {
    /// Scalars cannot be indexed
    NotIndexable,
    /// Sequence index is not a non-negative integer
    NonInteger,
    /// Sequence index is past the end
    OutOfRange,
    /// Mapping has no such key
    MissingKey,
}

// == Cache Error Enum ==
/// Unified error type for every cache layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value is not a string, list or map
    #[error("store only supports strings, lists and maps as values")]
    InvalidValue,

    /// Negative TTL passed to Set or construction
    #[error("TTL should be positive")]
    InvalidTtl,

    /// Key is absent or expired
    #[error("key not found")]
    KeyNotFound,

    /// Structural lookup failed
    #[error("cant Get item at index")]
    IndexAccess(IndexFault),

    /// Sharder built with zero shards
    #[error("must have at least one shard")]
    InvalidShardCount,

    /// Oplog line could not be decoded
    #[error("malformed log record at line {line}: {source}")]
    MalformedLogRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Oplog line names an operation this version does not know
    #[error("unknown operation type: {0}")]
    UnknownOperationKind(String),

    /// A committed mutation could not be encoded for the oplog
    #[error("failed to serialize log record: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Reading or positioning the log stream failed
    #[error("log stream error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TTL duration in a request
    #[error("Malformed duration")]
    MalformedDuration,

    /// Request body could not be parsed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Remote cache failed or answered with an unrecognised error
    #[error("remote cache error: {0}")]
    Remote(String),
}

impl CacheError {
    // == From Message ==
    /// Maps an error message produced by a remote instance back to its kind.
    ///
    /// Only the kinds a caller can act on are recovered; anything else is
    /// reported as `Remote` carrying the message.
    pub fn from_message(message: &str) -> Self {
        match message {
            "store only supports strings, lists and maps as values" => CacheError::InvalidValue,
            "TTL should be positive" => CacheError::InvalidTtl,
            "key not found" => CacheError::KeyNotFound,
            "cant Get item at index" => CacheError::IndexAccess(IndexFault::NotIndexable),
            "Malformed duration" => CacheError::MalformedDuration,
            other => CacheError::Remote(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse::new(self.to_string()));

        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
