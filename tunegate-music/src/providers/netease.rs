//! Netease Cloud Music web API provider
//!
//! Base URL is the API root (e.g. `https://music.163.com/api`):
//! - search: `GET {base}/search/get/web?s=<kw>&type=1&offset=0&limit=<n>`
//! - url:    `GET {base}/song/enhance/player/url?id=<id>&ids=[<id>]&br=<bitrate>`
//! - lyric:  `GET {base}/song/lyric?id=<id>&lv=-1&tv=-1`
//!
//! The API rejects requests without a music.163.com Referer.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use tunegate_common::config::ProviderConfig;
use tunegate_common::models::{AlbumRef, ArtistRef, CanonicalTrack};

use super::{join_url, LooseId, MusicProvider, UpstreamClient, UpstreamError};
use crate::normalize::{fee_from_code, upgrade_https, RawDuration};

const DEFAULT_REFERER: &str = "https://music.163.com";

#[derive(Debug, Deserialize)]
struct NeteaseSearchResponse {
    code: Option<i64>,
    result: Option<NeteaseSearchResult>,
}

#[derive(Debug, Deserialize)]
struct NeteaseSearchResult {
    /// Absent when nothing matched
    #[serde(default)]
    songs: Vec<NeteaseSong>,
}

#[derive(Debug, Deserialize)]
struct NeteaseSong {
    #[serde(default)]
    id: Option<LooseId>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<NeteaseArtist>,
    album: Option<NeteaseAlbum>,
    /// Milliseconds
    #[serde(default)]
    duration: Option<RawDuration>,
    #[serde(default)]
    fee: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NeteaseArtist {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct NeteaseAlbum {
    #[serde(default)]
    name: String,
    #[serde(rename = "picUrl")]
    pic_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NeteaseUrlResponse {
    #[serde(default)]
    data: Vec<NeteaseUrlEntry>,
}

#[derive(Debug, Deserialize)]
struct NeteaseUrlEntry {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NeteaseLyricResponse {
    lrc: Option<NeteaseLyric>,
}

#[derive(Debug, Deserialize)]
struct NeteaseLyric {
    lyric: Option<String>,
}

/// Netease Cloud Music provider
pub struct NeteaseProvider {
    name: String,
    base_url: String,
    referer: String,
    bitrate: u32,
    client: UpstreamClient,
}

impl NeteaseProvider {
    pub fn new(config: &ProviderConfig, client: UpstreamClient, bitrate: u32) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            referer: config
                .referer
                .clone()
                .unwrap_or_else(|| DEFAULT_REFERER.to_string()),
            bitrate,
            client,
        }
    }
}

fn to_track(song: NeteaseSong) -> Option<CanonicalTrack> {
    let id = song.id?.into_non_empty()?;
    let album = song.album.map(|a| AlbumRef {
        name: a.name,
        pic_url: a.pic_url.map(|u| upgrade_https(&u, true)).unwrap_or_default(),
    });

    Some(CanonicalTrack {
        id,
        name: song.name,
        artists: song.artists.into_iter().map(|a| ArtistRef::new(a.name)).collect(),
        album: album.unwrap_or_default(),
        duration_ms: song.duration.map(|d| d.whole_units()).unwrap_or(0),
        fee: fee_from_code(song.fee),
        source: None,
    })
}

fn tracks_from_response(
    response: NeteaseSearchResponse,
) -> Result<Vec<CanonicalTrack>, UpstreamError> {
    if let Some(code) = response.code.filter(|c| *c != 200) {
        return Err(UpstreamError::Unavailable(format!("netease returned code {}", code)));
    }
    let result = response
        .result
        .ok_or_else(|| UpstreamError::Malformed("netease search response has no result".to_string()))?;
    Ok(result.songs.into_iter().filter_map(to_track).collect())
}

#[async_trait]
impl MusicProvider for NeteaseProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<CanonicalTrack>, UpstreamError> {
        let response: NeteaseSearchResponse = self
            .client
            .get_json(
                &join_url(&self.base_url, "search/get/web"),
                &[
                    ("s", keyword.to_string()),
                    ("type", "1".to_string()),
                    ("offset", "0".to_string()),
                    ("limit", limit.to_string()),
                ],
                Some(&self.referer),
            )
            .await?;

        let tracks = tracks_from_response(response)?;
        debug!(provider = %self.name, count = tracks.len(), "netease search complete");
        Ok(tracks)
    }

    async fn track_url(&self, id: &str) -> Result<Option<String>, UpstreamError> {
        let response: NeteaseUrlResponse = self
            .client
            .get_json(
                &join_url(&self.base_url, "song/enhance/player/url"),
                &[
                    ("id", id.to_string()),
                    ("ids", format!("[{}]", id)),
                    ("br", self.bitrate.to_string()),
                ],
                Some(&self.referer),
            )
            .await?;

        Ok(response
            .data
            .into_iter()
            .next()
            .and_then(|entry| entry.url)
            .filter(|url| !url.trim().is_empty()))
    }

    async fn lyric(&self, id: &str) -> Result<Option<String>, UpstreamError> {
        let response: NeteaseLyricResponse = self
            .client
            .get_json(
                &join_url(&self.base_url, "song/lyric"),
                &[
                    ("id", id.to_string()),
                    ("lv", "-1".to_string()),
                    ("tv", "-1".to_string()),
                ],
                Some(&self.referer),
            )
            .await?;

        Ok(response
            .lrc
            .and_then(|lrc| lrc.lyric)
            .filter(|lyric| !lyric.is_empty()))
    }
}
