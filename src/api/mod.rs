//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `GET /` - List every key
//! - `GET /:key` - Retrieve an entry
//! - `POST /:key?ttl=<duration>` - Store a JSON value
//! - `DELETE /:key` - Remove a key
//! - `GET /:key/:index` - Retrieve one element of a list or map

pub mod auth;
pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
