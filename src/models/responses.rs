//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies. Successful
//! calls answer with the cache's own types (`Entry`, key lists, raw JSON).

use serde::{Deserialize, Serialize};

/// Body of a successful DELETE.
pub const REMOVED: &str = "OK";

/// Error response body for every failed cache call
///
/// Also decoded by `RemoteCache` to recover the error kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
