//! Basic Auth Middleware
//!
//! Rejects requests without the configured `Authorization: Basic` pair.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use super::handlers::AppState;

/// Decodes a `Basic <base64(login:password)>` header value.
pub fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (login, password) = decoded.split_once(':')?;
    Some((login.to_string(), password.to_string()))
}

/// Middleware enforcing basic auth when the state carries credentials.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.credentials else {
        return next.run(request).await;
    };

    let supplied = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(decode_basic);

    match supplied {
        Some((login, password)) if expected.matches(&login, &password) => next.run(request).await,
        _ => {
            warn!("Rejected unauthenticated {} {}", request.method(), request.uri().path());
            (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response()
        }
    }
}
