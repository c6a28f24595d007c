//! Multi-source resolver
//!
//! Turns the three client operations (search, playback URL, lyrics) into
//! calls against the configured providers, in order, and normalises the
//! outcome. Upstream failures never reach the client unless the failure
//! policy is `strict`.
//!
//! # Fallback order
//! - search: first search-role provider (`single`) or all of them concurrently (`aggregate`)
//! - playback: each url-role provider in order, then the constructed fallback URL
//! - lyrics: each lyric-role provider in order, then empty text

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use tunegate_common::config::{
    FailurePolicy, ProviderRole, ResolverConfig, SearchMode, TomlConfig,
};
use tunegate_common::models::{
    CanonicalTrack, Fee, LyricsResult, PlaybackResult, PlaybackSource,
};

use crate::normalize::{fallback_url, upgrade_https};
use crate::providers::{build_provider, MusicProvider, UpstreamClient, UpstreamError};

/// Resolver failure visible to the HTTP layer
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Required argument missing or blank
    #[error("{0}")]
    InvalidArgument(String),

    /// Every upstream failed (strict policy only)
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// No provider produced a stream URL (strict policy only)
    #[error("{0}")]
    NoPlayableSource(String),
}

/// Tunables taken from the `[resolver]` config table
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub failure_policy: FailurePolicy,
    pub search_mode: SearchMode,
    pub result_limit: usize,
    pub nominal_bitrate: u32,
    pub force_https: bool,
    pub fallback_url_template: String,
}

impl From<&ResolverConfig> for ResolverOptions {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            failure_policy: config.failure_policy,
            search_mode: config.search_mode,
            result_limit: config.result_limit,
            nominal_bitrate: config.nominal_bitrate,
            force_https: config.force_https,
            fallback_url_template: config.fallback_url_template.clone(),
        }
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from(&ResolverConfig::default())
    }
}

/// Resolver over an ordered set of providers per role
pub struct Resolver {
    searchers: Vec<Arc<dyn MusicProvider>>,
    url_chain: Vec<Arc<dyn MusicProvider>>,
    lyric_chain: Vec<Arc<dyn MusicProvider>>,
    options: ResolverOptions,
}

impl Resolver {
    pub fn new(
        searchers: Vec<Arc<dyn MusicProvider>>,
        url_chain: Vec<Arc<dyn MusicProvider>>,
        lyric_chain: Vec<Arc<dyn MusicProvider>>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            searchers,
            url_chain,
            lyric_chain,
            options,
        }
    }

    /// Build providers from configuration, sharing one HTTP client
    pub fn from_config(config: &TomlConfig) -> tunegate_common::Result<Self> {
        let client = UpstreamClient::new(&config.upstream)?;
        let options = ResolverOptions::from(&config.resolver);
        let bitrate = options.nominal_bitrate;

        let chain = |role: ProviderRole| -> Vec<Arc<dyn MusicProvider>> {
            config
                .providers_with_role(role)
                .map(|p| build_provider(p, client.clone(), bitrate))
                .collect()
        };

        let resolver = Self::new(
            chain(ProviderRole::Search),
            chain(ProviderRole::Url),
            chain(ProviderRole::Lyric),
            options,
        );

        info!(
            searchers = ?resolver.names(&resolver.searchers),
            url_chain = ?resolver.names(&resolver.url_chain),
            lyric_chain = ?resolver.names(&resolver.lyric_chain),
            "Resolver configured"
        );
        Ok(resolver)
    }

    fn names<'a>(&self, providers: &'a [Arc<dyn MusicProvider>]) -> Vec<&'a str> {
        providers.iter().map(|p| p.name()).collect()
    }

    fn is_strict(&self) -> bool {
        self.options.failure_policy == FailurePolicy::Strict
    }

    /// Keyword search
    pub async fn search(&self, keyword: &str) -> Result<Vec<CanonicalTrack>, ResolveError> {
        let keyword = require("keyword", keyword)?;

        match self.options.search_mode {
            SearchMode::Single => self.search_single(keyword).await,
            SearchMode::Aggregate => self.search_aggregate(keyword).await,
        }
    }

    async fn search_single(&self, keyword: &str) -> Result<Vec<CanonicalTrack>, ResolveError> {
        let limit = self.options.result_limit;
        let Some(provider) = self.searchers.first() else {
            return self.absorb_search_failure("no search provider configured".to_string());
        };

        match provider.search(keyword, limit).await {
            Ok(mut tracks) => {
                tracks.truncate(limit);
                info!(provider = provider.name(), keyword = %keyword, count = tracks.len(), "Search complete");
                Ok(tracks)
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Search failed");
                self.absorb_search_failure(format!("{}: {}", provider.name(), e))
            }
        }
    }

    async fn search_aggregate(&self, keyword: &str) -> Result<Vec<CanonicalTrack>, ResolveError> {
        let limit = self.options.result_limit;
        let outcomes = join_all(self.searchers.iter().map(|p| p.search(keyword, limit))).await;

        let mut answered = 0usize;
        let mut batches = Vec::with_capacity(outcomes.len());
        for (provider, outcome) in self.searchers.iter().zip(outcomes) {
            match outcome {
                Ok(tracks) => {
                    answered += 1;
                    debug!(provider = provider.name(), count = tracks.len(), "Aggregate search contribution");
                    batches.push((provider.name().to_string(), tracks));
                }
                Err(e) => warn!(provider = provider.name(), error = %e, "Search failed"),
            }
        }

        if answered == 0 {
            return self.absorb_search_failure("all search providers failed".to_string());
        }

        let tracks = merge_ranked(batches, keyword, limit);
        info!(keyword = %keyword, providers = answered, count = tracks.len(), "Aggregate search complete");
        Ok(tracks)
    }

    fn absorb_search_failure(&self, reason: String) -> Result<Vec<CanonicalTrack>, ResolveError> {
        if self.is_strict() {
            Err(ResolveError::UpstreamUnavailable(reason))
        } else {
            Ok(Vec::new())
        }
    }

    /// Playback URL; never empty under the best-effort policy
    pub async fn track_url(&self, id: &str) -> Result<PlaybackResult, ResolveError> {
        let id = require("id", id)?;

        for provider in &self.url_chain {
            match provider.track_url(id).await {
                Ok(Some(url)) => {
                    info!(provider = provider.name(), id = %id, "Playback URL resolved");
                    return Ok(PlaybackResult {
                        id: id.to_string(),
                        url: upgrade_https(&url, self.options.force_https),
                        bitrate_bps: self.options.nominal_bitrate,
                        source: PlaybackSource::Upstream(provider.name().to_string()),
                    });
                }
                Ok(None) => debug!(provider = provider.name(), id = %id, "No playback URL"),
                Err(UpstreamError::Unsupported) => {}
                Err(e) => warn!(provider = provider.name(), id = %id, error = %e, "Playback lookup failed"),
            }
        }

        if self.is_strict() {
            return Err(ResolveError::NoPlayableSource(format!(
                "no provider returned a playable URL for {}",
                id
            )));
        }

        info!(id = %id, "Using constructed fallback URL");
        Ok(PlaybackResult {
            id: id.to_string(),
            url: fallback_url(&self.options.fallback_url_template, id),
            bitrate_bps: self.options.nominal_bitrate,
            source: PlaybackSource::Fallback,
        })
    }

    /// Lyrics; empty text when nobody has them
    pub async fn lyric(&self, id: &str) -> Result<LyricsResult, ResolveError> {
        let id = require("id", id)?;

        let mut attempted = 0usize;
        let mut failed = 0usize;
        for provider in &self.lyric_chain {
            match provider.lyric(id).await {
                Ok(Some(lyric_text)) => {
                    debug!(provider = provider.name(), id = %id, "Lyric found");
                    return Ok(LyricsResult { lyric_text });
                }
                Ok(None) => attempted += 1,
                Err(UpstreamError::Unsupported) => {}
                Err(e) => {
                    attempted += 1;
                    failed += 1;
                    warn!(provider = provider.name(), id = %id, error = %e, "Lyric lookup failed");
                }
            }
        }

        if self.is_strict() && attempted > 0 && failed == attempted {
            return Err(ResolveError::UpstreamUnavailable(format!(
                "every lyric provider failed for {}",
                id
            )));
        }
        Ok(LyricsResult::default())
    }
}

/// Trimmed argument, or `InvalidArgument` when blank
fn require<'a>(name: &str, value: &'a str) -> Result<&'a str, ResolveError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ResolveError::InvalidArgument(format!("{} is required", name)));
    }
    Ok(value)
}

/// Merge per-provider results for aggregate search
///
/// Deduplicates on lower-cased `name-first artist` (first occurrence wins),
/// then stable-sorts free before paid, exact title before partial, and titles
/// containing the keyword before the rest.
fn merge_ranked(
    batches: Vec<(String, Vec<CanonicalTrack>)>,
    keyword: &str,
    limit: usize,
) -> Vec<CanonicalTrack> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for (source, tracks) in batches {
        for mut track in tracks {
            let key = format!("{}-{}", track.name, track.primary_artist()).to_lowercase();
            if seen.insert(key) {
                track.source = Some(source.clone());
                merged.push(track);
            }
        }
    }

    let keyword = keyword.to_lowercase();
    merged.sort_by_key(|track| {
        let name = track.name.to_lowercase();
        (track.fee != Fee::Free, name != keyword, !name.contains(&keyword))
    });
    merged.truncate(limit);
    merged
}
