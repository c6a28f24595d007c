//! tunegate-music library - multi-source music metadata resolver
//!
//! Answers search, playback-URL and lyric requests by querying upstream
//! music providers in a configured order and normalising their answers into
//! one canonical schema.

use axum::http::{header, HeaderValue};
use axum::Router;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod normalize;
pub mod providers;
pub mod resolver;

pub use resolver::Resolver;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

impl AppState {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

/// Build application router
///
/// Unknown paths get the health payload. Every response carries
/// `Access-Control-Allow-Origin: *` and a JSON content type.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    Router::new()
        .route("/api/music/search", get(api::music::search))
        .route("/api/music/url", get(api::music::track_url))
        .route("/api/music/lyric", get(api::music::lyric))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes())
        .fallback(api::health_check)
        .with_state(state)
        .layer(api::cors_layer())
        .layer(middleware::from_fn(api::answer_options))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(TraceLayer::new_for_http())
}
