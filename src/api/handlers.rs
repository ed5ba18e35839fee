//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value as JsonValue;
use tokio::fs::OpenOptions;
use tracing::info;

use crate::cache::{Cache, CacheBuilder, Entry, Value};
use crate::config::{Config, Credentials};
use crate::error::{CacheError, Result};
use crate::models::{SetQuery, REMOVED};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Fully assembled cache stack
    pub cache: Arc<dyn Cache>,
    /// Basic auth credentials; None leaves the API open
    pub credentials: Option<Credentials>,
}

impl AppState {
    /// Creates a new AppState serving `cache` without authentication.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            credentials: None,
        }
    }

    /// Requires basic auth with `credentials` on every endpoint.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens (creating if needed) the oplog file when one is configured and
    /// replays it before returning.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let builder = CacheBuilder::from_config(config)?;

        let cache = match &config.log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(path)
                    .await?;
                info!("Replaying oplog from {}", path.display());
                builder.build_with_log(file).await?
            }
            None => builder.build().await?,
        };

        Ok(Self {
            cache,
            credentials: config.credentials.clone(),
        })
    }
}

/// Handler for GET /
///
/// Lists every live key.
pub async fn keys_handler(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let keys = state.cache.keys().await?;
    Ok(Json(keys))
}

/// Handler for GET /:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Entry>> {
    let entry = state.cache.get(&key).await?;
    Ok(Json(entry))
}

/// Handler for POST /:key
///
/// The body is the JSON value to store; `ttl` in the query string is an
/// optional duration such as `10s`.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SetQuery>,
    body: Bytes,
) -> Result<Json<Entry>> {
    let ttl = query.ttl()?;

    let raw: JsonValue = serde_json::from_slice(&body)
        .map_err(|e| CacheError::InvalidRequest(e.to_string()))?;
    let value = Value::try_from(raw)?;

    let entry = state.cache.set(&key, value, ttl).await?;
    Ok(Json(entry))
}

/// Handler for DELETE /:key
pub async fn remove_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<&'static str>> {
    state.cache.remove(&key).await?;
    Ok(Json(REMOVED))
}

/// Handler for GET /:key/:index
///
/// Returns the element as raw JSON.
pub async fn index_handler(
    State(state): State<AppState>,
    Path((key, index)): Path<(String, String)>,
) -> Result<Json<JsonValue>> {
    let element = state.cache.get_at_index(&key, &index).await?;
    Ok(Json(element))
}
