//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::auth::require_basic_auth;
use super::handlers::{
    get_handler, index_handler, keys_handler, remove_handler, set_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /` - List every key
/// - `GET /:key` - Retrieve an entry
/// - `POST /:key` - Store a JSON value, `?ttl=` optional
/// - `DELETE /:key` - Remove a key
/// - `GET /:key/:index` - Retrieve one element of a list or map
///
/// # Middleware
/// - Basic auth: enforced when the state carries credentials
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(keys_handler))
        .route(
            "/:key",
            get(get_handler).post(set_handler).delete(remove_handler),
        )
        .route("/:key/:index", get(index_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
