//! Music resolver endpoints
//!
//! Responses follow the netease-style envelopes the web client reads:
//! - `GET /api/music/search?keyword=` -> `{result: {songs, songCount}}`
//! - `GET /api/music/url?id=` -> `{data: [{id, url, br}]}`
//! - `GET /api/music/lyric?id=` -> `{lrc: {lyric}}`
//!
//! Query strings are read as raw pairs so a repeated parameter never fails
//! extraction; the first occurrence wins.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use tracing::debug;
use tunegate_common::models::{LyricEnvelope, SearchEnvelope, UrlEnvelope};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Decoded query string in request order
pub type QueryPairs = Vec<(String, String)>;

/// First value of `name`; empty when absent
pub fn first_param(pairs: &[(String, String)], name: &str) -> String {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
        .unwrap_or_default()
}

fn pairs(query: Result<Query<QueryPairs>, QueryRejection>) -> ApiResult<QueryPairs> {
    query.map(|Query(pairs)| pairs).map_err(ApiError::from)
}

/// GET /api/music/search?keyword=...
pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> ApiResult<Json<SearchEnvelope>> {
    let keyword = first_param(&pairs(query)?, "keyword");
    let songs = state.resolver.search(&keyword).await?;
    Ok(Json(SearchEnvelope::new(songs)))
}

/// GET /api/music/url?id=...
pub async fn track_url(
    State(state): State<AppState>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> ApiResult<Json<UrlEnvelope>> {
    let id = first_param(&pairs(query)?, "id");
    let result = state.resolver.track_url(&id).await?;
    debug!(id = %result.id, source = ?result.source, "Serving playback URL");
    Ok(Json(UrlEnvelope::from(&result)))
}

/// GET /api/music/lyric?id=...
pub async fn lyric(
    State(state): State<AppState>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> ApiResult<Json<LyricEnvelope>> {
    let id = first_param(&pairs(query)?, "id");
    let result = state.resolver.lyric(&id).await?;
    Ok(Json(LyricEnvelope::from(result)))
}
