//! Error types for the realtime gateway
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Authentication Error ==
/// Why a connection attempt could not be authenticated.
///
/// Always terminal for that attempt; the client must open a new connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Neither a `token` query parameter nor a bearer header was supplied
    #[error("missing credential")]
    MissingCredential,

    /// The credential is unknown or malformed
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The credential was valid but has expired
    #[error("credential expired")]
    Expired,
}

// == Lookup Error ==
/// Failure of the record store during a cache miss.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The record store could not be reached or answered with an error
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

// == API Error ==
/// Errors returned by the internal HTTP surface.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or wrong API key
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A campus-admin lookup failed
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Lookup(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
