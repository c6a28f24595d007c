//! vkeys.cn provider
//!
//! One base URL per catalogue (e.g. `.../v2/music/tencent`, `.../v2/music/netease`):
//! - search: `GET {base}?word=<kw>&limit=<n>`
//! - url:    `GET {base}?id=<id>`
//! - lyric:  `GET {base}/lyric?id=<id>`
//!
//! Every response is wrapped as `{code, data}`; `code != 200` is a failure.
//! Durations arrive as `"M分S秒"` text, pay status as a label such as `免费`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use tunegate_common::config::{IdField, ProviderConfig, DEFAULT_FREE_LABEL};
use tunegate_common::models::{AlbumRef, ArtistRef, CanonicalTrack};

use super::{first_non_empty, join_url, LooseId, MusicProvider, UpstreamClient, UpstreamError};
use crate::normalize::{fee_from_label, RawDuration};

const VKEYS_OK: i64 = 200;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    /// Payload of a successful response; `Ok(None)` when `data` is absent
    fn into_data(self) -> Result<Option<T>, UpstreamError> {
        if self.code != VKEYS_OK {
            return Err(UpstreamError::Unavailable(format!(
                "vkeys returned code {}{}",
                self.code,
                self.message.map(|m| format!(": {}", m)).unwrap_or_default()
            )));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
struct VkeysSong {
    #[serde(default)]
    id: Option<LooseId>,
    #[serde(default)]
    mid: Option<String>,
    #[serde(default)]
    song: Option<String>,
    #[serde(default)]
    singer: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    interval: Option<RawDuration>,
    #[serde(default)]
    pay: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VkeysUrl {
    #[serde(default)]
    url: Option<String>,
}

/// The URL endpoint answers with an object or a one-element array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VkeysUrlData {
    One(VkeysUrl),
    Many(Vec<VkeysUrl>),
}

impl VkeysUrlData {
    fn into_url(self) -> Option<String> {
        match self {
            VkeysUrlData::One(entry) => entry.url,
            VkeysUrlData::Many(entries) => entries.into_iter().next().and_then(|e| e.url),
        }
        .filter(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct VkeysLyric {
    #[serde(default)]
    lrc: Option<String>,
}

/// vkeys.cn provider
pub struct VkeysProvider {
    name: String,
    base_url: String,
    free_label: String,
    id_field: IdField,
    referer: Option<String>,
    client: UpstreamClient,
}

impl VkeysProvider {
    pub fn new(config: &ProviderConfig, client: UpstreamClient) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            free_label: config
                .free_label
                .clone()
                .unwrap_or_else(|| DEFAULT_FREE_LABEL.to_string()),
            id_field: config.id_field,
            referer: config.referer.clone(),
            client,
        }
    }

    fn to_track(&self, song: VkeysSong) -> Option<CanonicalTrack> {
        let numeric_id = song.id.map(|id| id.to_string());
        let id = match self.id_field {
            IdField::Mid => first_non_empty(&[song.mid.as_deref(), numeric_id.as_deref()]),
            IdField::Id => first_non_empty(&[numeric_id.as_deref(), song.mid.as_deref()]),
        }?
        .to_string();

        Some(CanonicalTrack {
            id,
            name: song.song.unwrap_or_default(),
            artists: song.singer.into_iter().map(ArtistRef::new).collect(),
            album: AlbumRef {
                name: song.album.unwrap_or_default(),
                pic_url: song.cover.unwrap_or_default(),
            },
            duration_ms: song.interval.map(|d| d.to_millis()).unwrap_or(0),
            fee: fee_from_label(song.pay.as_deref(), &self.free_label),
            source: None,
        })
    }

    fn tracks_from_response(
        &self,
        response: Envelope<Vec<VkeysSong>>,
    ) -> Result<Vec<CanonicalTrack>, UpstreamError> {
        let songs = response
            .into_data()?
            .ok_or_else(|| UpstreamError::Malformed("vkeys search response has no data".to_string()))?;
        Ok(songs.into_iter().filter_map(|s| self.to_track(s)).collect())
    }
}

#[async_trait]
impl MusicProvider for VkeysProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<CanonicalTrack>, UpstreamError> {
        let response: Envelope<Vec<VkeysSong>> = self
            .client
            .get_json(
                &self.base_url,
                &[("word", keyword.to_string()), ("limit", limit.to_string())],
                self.referer.as_deref(),
            )
            .await?;

        let tracks = self.tracks_from_response(response)?;
        debug!(provider = %self.name, count = tracks.len(), "vkeys search complete");
        Ok(tracks)
    }

    async fn track_url(&self, id: &str) -> Result<Option<String>, UpstreamError> {
        let response: Envelope<VkeysUrlData> = self
            .client
            .get_json(&self.base_url, &[("id", id.to_string())], self.referer.as_deref())
            .await?;
        Ok(response.into_data()?.and_then(VkeysUrlData::into_url))
    }

    async fn lyric(&self, id: &str) -> Result<Option<String>, UpstreamError> {
        let response: Envelope<VkeysLyric> = self
            .client
            .get_json(
                &join_url(&self.base_url, "lyric"),
                &[("id", id.to_string())],
                self.referer.as_deref(),
            )
            .await?;
        Ok(response
            .into_data()?
            .and_then(|data| data.lrc)
            .filter(|lrc| !lrc.is_empty()))
    }
}
