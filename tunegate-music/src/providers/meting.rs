//! Meting-compatible API provider
//!
//! Single endpoint selected by query parameters:
//! `GET {base}?server=<server>&type=<search|url|lyric>&id=<keyword or id>`

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use tunegate_common::config::ProviderConfig;
use tunegate_common::models::{AlbumRef, ArtistRef, CanonicalTrack, Fee};

use super::{LooseId, MusicProvider, UpstreamClient, UpstreamError};
use crate::normalize::RawDuration;

const DEFAULT_SERVER: &str = "netease";

#[derive(Debug, Deserialize)]
struct MetingSong {
    #[serde(default)]
    id: Option<LooseId>,
    #[serde(default)]
    name: String,
    artist: Option<String>,
    album: Option<String>,
    pic: Option<String>,
    /// Seconds
    time: Option<RawDuration>,
}

#[derive(Debug, Deserialize)]
struct MetingUrl {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetingLyric {
    lyric: Option<String>,
}

fn to_track(song: MetingSong) -> Option<CanonicalTrack> {
    Some(CanonicalTrack {
        id: song.id?.into_non_empty()?,
        name: song.name,
        artists: song
            .artist
            .filter(|a| !a.is_empty())
            .into_iter()
            .map(ArtistRef::new)
            .collect(),
        album: AlbumRef {
            name: song.album.unwrap_or_default(),
            pic_url: song.pic.unwrap_or_default(),
        },
        duration_ms: song.time.map(|t| t.to_millis()).unwrap_or(0),
        // No pay status exposed
        fee: Fee::Free,
        source: None,
    })
}

/// Meting API provider
pub struct MetingProvider {
    name: String,
    base_url: String,
    server: String,
    referer: Option<String>,
    client: UpstreamClient,
}

impl MetingProvider {
    pub fn new(config: &ProviderConfig, client: UpstreamClient) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            server: config
                .server
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            referer: config.referer.clone(),
            client,
        }
    }

    fn query(&self, kind: &str, id: &str) -> [(&'static str, String); 3] {
        [
            ("server", self.server.clone()),
            ("type", kind.to_string()),
            ("id", id.to_string()),
        ]
    }
}

#[async_trait]
impl MusicProvider for MetingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<CanonicalTrack>, UpstreamError> {
        let songs: Vec<MetingSong> = self
            .client
            .get_json(&self.base_url, &self.query("search", keyword), self.referer.as_deref())
            .await?;

        // Meting has no limit parameter
        let tracks: Vec<CanonicalTrack> = songs.into_iter().filter_map(to_track).take(limit).collect();
        debug!(provider = %self.name, count = tracks.len(), "meting search complete");
        Ok(tracks)
    }

    async fn track_url(&self, id: &str) -> Result<Option<String>, UpstreamError> {
        let entries: Vec<MetingUrl> = self
            .client
            .get_json(&self.base_url, &self.query("url", id), self.referer.as_deref())
            .await?;
        Ok(entries
            .into_iter()
            .next()
            .and_then(|e| e.url)
            .filter(|url| !url.trim().is_empty()))
    }

    async fn lyric(&self, id: &str) -> Result<Option<String>, UpstreamError> {
        let response: MetingLyric = self
            .client
            .get_json(&self.base_url, &self.query("lyric", id), self.referer.as_deref())
            .await?;
        Ok(response.lyric.filter(|lyric| !lyric.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_mapping() {
        let songs: Vec<MetingSong> = serde_json::from_value(json!([
            {"id": "186016", "name": "晴天", "artist": "周杰伦", "album": "叶惠美", "pic": "https://a.test/p.jpg", "time": 269},
            {"id": 7, "name": "No time", "artist": ""},
            {"id": "", "name": "No id"},
            {"name": "Id missing entirely", "time": 12.5},
            {"id": 8, "name": "Negative", "time": -3}
        ]))
        .unwrap();

        let tracks: Vec<CanonicalTrack> = songs.into_iter().filter_map(to_track).collect();
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].id, "186016");
        assert_eq!(tracks[0].primary_artist(), "周杰伦");
        assert_eq!(tracks[0].duration_ms, 269_000);
        assert_eq!(tracks[0].fee, Fee::Free);
        assert_eq!(tracks[1].id, "7");
        assert!(tracks[1].artists.is_empty());
        assert_eq!(tracks[1].duration_ms, 0);
        assert_eq!(tracks[2].id, "8");
        assert_eq!(tracks[2].duration_ms, 0);
    }
}
