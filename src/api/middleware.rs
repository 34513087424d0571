//! API Middleware
//!
//! Shared-secret guard for the internal emit API.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::handlers::AppState;
use crate::error::ApiError;

/// Header carrying the emit API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects emit requests whose `x-api-key` does not match the configured key.
///
/// With no key configured every emit request is rejected.
pub async fn require_emit_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.emit_api_key.as_deref() else {
        warn!(path = %request.uri().path(), "Emit request refused: no API key configured");
        return Err(ApiError::Unauthorized("emit API is disabled".to_string()));
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!(path = %request.uri().path(), "Emit request refused: wrong API key");
            Err(ApiError::Unauthorized("invalid API key".to_string()))
        }
        None => Err(ApiError::Unauthorized(format!("missing {} header", API_KEY_HEADER))),
    }
}

/// Compares two byte strings in time independent of where they differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
