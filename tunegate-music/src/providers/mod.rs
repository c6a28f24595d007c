//! Upstream music providers
//!
//! Each provider speaks one upstream "dialect" (request parameters plus
//! response shape) and normalises what it receives into [`CanonicalTrack`].
//! All providers share one [`UpstreamClient`] so timeouts and headers are
//! configured in a single place.
//!
//! # Dialects
//! - `vkeys`: vkeys.cn aggregated Tencent/Netease API (`code`/`data` envelope)
//! - `qq`: QQ Music `client_search_cp` search endpoint (search only)
//! - `netease`: music.163.com web API
//! - `meting`: Meting-compatible API (`server`/`type`/`id` parameters)

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use tunegate_common::config::{Dialect, ProviderConfig, UpstreamConfig};
use tunegate_common::models::CanonicalTrack;

pub mod meting;
pub mod netease;
pub mod qq;
pub mod vkeys;

pub use meting::MetingProvider;
pub use netease::NeteaseProvider;
pub use qq::QqProvider;
pub use vkeys::VkeysProvider;

/// Failure talking to an upstream provider
///
/// None of these reach the client directly; the resolver's failure policy
/// decides what the client sees.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Network failure, timeout or non-success status
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Response did not have the expected shape
    #[error("upstream response malformed: {0}")]
    Malformed(String),

    /// Provider has no endpoint for this operation
    #[error("operation not supported by provider")]
    Unsupported,
}

/// A music-data upstream
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Configured provider name, used in logs and aggregate results
    fn name(&self) -> &str;

    /// Search by keyword, returning at most `limit` canonical tracks
    async fn search(&self, keyword: &str, limit: usize)
        -> Result<Vec<CanonicalTrack>, UpstreamError>;

    /// Direct stream URL for an identifier; `Ok(None)` when the provider has none
    async fn track_url(&self, _id: &str) -> Result<Option<String>, UpstreamError> {
        Err(UpstreamError::Unsupported)
    }

    /// Lyric text for an identifier; `Ok(None)` when the provider has none
    async fn lyric(&self, _id: &str) -> Result<Option<String>, UpstreamError> {
        Err(UpstreamError::Unsupported)
    }
}

/// HTTP client shared by all providers
#[derive(Clone)]
pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    /// Build a client with the configured per-call timeout and User-Agent
    pub fn new(config: &UpstreamConfig) -> tunegate_common::Result<Self> {
        let mut headers = header::HeaderMap::new();
        let user_agent = header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            tunegate_common::Error::Config(format!("upstream.user_agent: {}", e))
        })?;
        headers.insert(header::USER_AGENT, user_agent);

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                tunegate_common::Error::Internal(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { http_client })
    }

    /// GET `url` with query parameters and decode the JSON body
    ///
    /// Query values are URL-encoded by reqwest. Network failures, timeouts and
    /// non-success statuses map to `Unavailable`; undecodable bodies map to
    /// `Malformed`. Upstreams that label JSON as text/html are still decoded.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        referer: Option<&str>,
    ) -> Result<T, UpstreamError> {
        debug!(url = %url, "Upstream request");

        let mut request = self.http_client.get(url).query(query);
        if let Some(referer) = referer {
            request = request.header(header::REFERER, referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("reading body from {}: {}", url, e)))?;

        serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::Malformed(format!("decoding body from {}: {}", url, e)))
    }
}

/// Identifier that upstreams send either as a number or a string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LooseId {
    Number(i64),
    Text(String),
}

impl LooseId {
    /// String form, `None` when empty
    pub fn into_non_empty(self) -> Option<String> {
        let s = self.to_string();
        if s.trim().is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

impl fmt::Display for LooseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LooseId::Number(n) => write!(f, "{}", n),
            LooseId::Text(s) => f.write_str(s),
        }
    }
}

/// First non-blank string among the candidates
pub(crate) fn first_non_empty<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.trim().is_empty())
}

/// Join a base URL and a path segment with exactly one slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Instantiate the provider described by `config`
///
/// `nominal_bitrate` is forwarded to dialects whose URL lookup takes a bitrate.
pub fn build_provider(
    config: &ProviderConfig,
    client: UpstreamClient,
    nominal_bitrate: u32,
) -> Arc<dyn MusicProvider> {
    match config.dialect {
        Dialect::Vkeys => Arc::new(VkeysProvider::new(config, client)),
        Dialect::Qq => Arc::new(QqProvider::new(config, client)),
        Dialect::Netease => Arc::new(NeteaseProvider::new(config, client, nominal_bitrate)),
        Dialect::Meting => Arc::new(MetingProvider::new(config, client)),
    }
}
