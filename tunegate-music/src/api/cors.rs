//! Cross-origin access for browser clients
//!
//! Preflights (OPTIONS carrying `Access-Control-Request-Method`) are answered
//! by [`cors_layer`]. A bare OPTIONS on any path is answered by
//! [`answer_options`] with an empty 204; it must sit outside the CORS layer,
//! which otherwise treats every OPTIONS as a preflight.

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// Methods the API answers
pub const ALLOWED_METHODS: &str = "GET, OPTIONS";

/// Preflight cache lifetime in seconds
pub const MAX_AGE_SECS: u64 = 86_400;

/// CORS policy: any origin, GET/OPTIONS, `Content-Type` header
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(MAX_AGE_SECS))
}

/// Answer non-preflight OPTIONS requests with 204 and the CORS headers
pub async fn answer_options(request: Request, next: Next) -> Response {
    let is_preflight = request
        .headers()
        .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
    if request.method() != Method::OPTIONS || is_preflight {
        return next.run(request).await;
    }

    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS)),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type")),
            (header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(MAX_AGE_SECS)),
        ],
    )
        .into_response()
}
