//! HTTP error responses for tunegate-music

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::resolver::ResolveError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or blank query parameter (400)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Every upstream failed under the strict policy (502)
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// No playable URL under the strict policy (502)
    #[error("No playable source: {0}")]
    NoPlayableSource(String),
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidArgument(msg) => ApiError::InvalidArgument(msg),
            ResolveError::UpstreamUnavailable(msg) => ApiError::UpstreamUnavailable(msg),
            ResolveError::NoPlayableSource(msg) => ApiError::NoPlayableSource(msg),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidArgument(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg),
            ApiError::UpstreamUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", msg)
            }
            ApiError::NoPlayableSource(msg) => (StatusCode::BAD_GATEWAY, "NO_PLAYABLE_SOURCE", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
