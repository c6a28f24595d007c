//! QQ Music direct search provider
//!
//! Queries the public `client_search_cp` endpoint. It exposes neither stream
//! URLs nor pay status, so tracks are always free and playback relies on the
//! other tiers. Album art is synthesised from the album mid.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use tunegate_common::config::{ProviderConfig, DEFAULT_QQ_ART_TEMPLATE};
use tunegate_common::models::{AlbumRef, ArtistRef, CanonicalTrack, Fee};

use super::{first_non_empty, LooseId, MusicProvider, UpstreamClient, UpstreamError};
use crate::normalize::{art_from_template, RawDuration};

const DEFAULT_REFERER: &str = "https://y.qq.com";
const UNKNOWN_ALBUM: &str = "未知专辑";

#[derive(Debug, Deserialize)]
struct QqSearchResponse {
    data: Option<QqSearchData>,
}

#[derive(Debug, Deserialize)]
struct QqSearchData {
    song: Option<QqSongPage>,
}

#[derive(Debug, Deserialize)]
struct QqSongPage {
    #[serde(default)]
    list: Vec<QqSong>,
}

/// A search hit in either the legacy (`songmid`) or new (`mid`) field layout
#[derive(Debug, Deserialize)]
struct QqSong {
    songmid: Option<String>,
    mid: Option<String>,
    songid: Option<LooseId>,
    id: Option<LooseId>,
    songname: Option<String>,
    name: Option<String>,
    #[serde(default)]
    singer: Vec<QqSinger>,
    albumname: Option<String>,
    albummid: Option<String>,
    album: Option<QqAlbum>,
    interval: Option<RawDuration>,
}

#[derive(Debug, Deserialize)]
struct QqSinger {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct QqAlbum {
    mid: Option<String>,
    name: Option<String>,
}

/// QQ Music search-only provider
pub struct QqProvider {
    name: String,
    base_url: String,
    art_template: String,
    referer: String,
    client: UpstreamClient,
}

impl QqProvider {
    pub fn new(config: &ProviderConfig, client: UpstreamClient) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            art_template: config
                .art_template
                .clone()
                .unwrap_or_else(|| DEFAULT_QQ_ART_TEMPLATE.to_string()),
            referer: config
                .referer
                .clone()
                .unwrap_or_else(|| DEFAULT_REFERER.to_string()),
            client,
        }
    }

    fn to_track(&self, song: QqSong) -> Option<CanonicalTrack> {
        let songid = song.songid.map(|id| id.to_string());
        let plain_id = song.id.map(|id| id.to_string());
        let id = first_non_empty(&[
            song.songmid.as_deref(),
            song.mid.as_deref(),
            songid.as_deref(),
            plain_id.as_deref(),
        ])?
        .to_string();

        let album_name = first_non_empty(&[
            song.albumname.as_deref(),
            song.album.as_ref().and_then(|a| a.name.as_deref()),
        ])
        .unwrap_or(UNKNOWN_ALBUM)
        .to_string();
        let album_mid = first_non_empty(&[
            song.albummid.as_deref(),
            song.album.as_ref().and_then(|a| a.mid.as_deref()),
        ]);

        Some(CanonicalTrack {
            id,
            name: first_non_empty(&[song.songname.as_deref(), song.name.as_deref()])
                .unwrap_or_default()
                .to_string(),
            artists: song.singer.into_iter().map(|s| ArtistRef::new(s.name)).collect(),
            album: AlbumRef {
                name: album_name,
                pic_url: art_from_template(&self.art_template, album_mid),
            },
            duration_ms: song.interval.map(|d| d.to_millis()).unwrap_or(0),
            // No pay status exposed by this endpoint
            fee: Fee::Free,
            source: None,
        })
    }

    fn tracks_from_response(
        &self,
        response: QqSearchResponse,
    ) -> Result<Vec<CanonicalTrack>, UpstreamError> {
        let page = response
            .data
            .and_then(|d| d.song)
            .ok_or_else(|| UpstreamError::Malformed("qq search response has no data.song".to_string()))?;
        Ok(page.list.into_iter().filter_map(|s| self.to_track(s)).collect())
    }
}

/// Fixed client_search_cp parameter set
fn search_query(keyword: &str, limit: usize) -> Vec<(&'static str, String)> {
    let search_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    vec![
        ("ct", "24".to_string()),
        ("qqmusic_ver", "1298".to_string()),
        ("new_json", "1".to_string()),
        ("remoteplace", "txt.yqq.song".to_string()),
        ("searchid", search_id.to_string()),
        ("t", "0".to_string()),
        ("aggr", "1".to_string()),
        ("cr", "1".to_string()),
        ("catZhida", "1".to_string()),
        ("lossless", "0".to_string()),
        ("flag_qc", "0".to_string()),
        ("p", "1".to_string()),
        ("n", limit.to_string()),
        ("w", keyword.to_string()),
        ("g_tk", "5381".to_string()),
        ("loginUin", "0".to_string()),
        ("hostUin", "0".to_string()),
        ("format", "json".to_string()),
        ("inCharset", "utf8".to_string()),
        ("outCharset", "utf-8".to_string()),
        ("notice", "0".to_string()),
        ("platform", "yqq.json".to_string()),
        ("needNewCode", "0".to_string()),
    ]
}

#[async_trait]
impl MusicProvider for QqProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<CanonicalTrack>, UpstreamError> {
        let response: QqSearchResponse = self
            .client
            .get_json(&self.base_url, &search_query(keyword, limit), Some(&self.referer))
            .await?;

        let tracks = self.tracks_from_response(response)?;
        debug!(provider = %self.name, count = tracks.len(), "qq search complete");
        Ok(tracks)
    }
}
