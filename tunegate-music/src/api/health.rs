//! Health check endpoint
//!
//! The same payload answers `/health` and any path the router does not know,
//! so a client probing the base URL always gets JSON back.

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

const MODULE_NAME: &str = "tunegate-music";
const SERVICE_NAME: &str = "music metadata resolver";

/// Liveness payload
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

impl HealthResponse {
    fn ok() -> Self {
        Self {
            status: "ok",
            module: MODULE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            service: SERVICE_NAME,
        }
    }
}

/// GET /health, and the router fallback
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
