//! Canonical music data model
//!
//! Every upstream provider is normalised into these shapes before anything is
//! returned to a client. The wire envelopes mirror the netease-style schema the
//! consuming web client reads (`result.songs`, `data[0].url`, `lrc.lyric`).

use serde::{Deserialize, Serialize};

/// Pay status of a track: `0` free, `1` paid on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Fee {
    Free,
    Paid,
}

impl From<Fee> for u8 {
    fn from(fee: Fee) -> u8 {
        match fee {
            Fee::Free => 0,
            Fee::Paid => 1,
        }
    }
}

impl TryFrom<u8> for Fee {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Fee::Free),
            1 => Ok(Fee::Paid),
            other => Err(format!("fee must be 0 or 1, got {}", other)),
        }
    }
}

/// Artist reference inside a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

impl ArtistRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Album reference inside a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub name: String,
    #[serde(rename = "picUrl")]
    pub pic_url: String,
}

/// A track in the canonical schema, regardless of which upstream served it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTrack {
    /// Opaque upstream key; pass back unchanged to `/url` and `/lyric`
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    pub album: AlbumRef,
    /// Track length in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub fee: Fee,
    /// Provider name, only populated by aggregate search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CanonicalTrack {
    /// Name of the first credited artist, empty if none
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }
}

/// Which fallback tier produced a playback URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackSource {
    /// A provider returned a real stream URL
    Upstream(String),
    /// The constructed template URL
    Fallback,
}

/// Result of the playback-URL operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackResult {
    pub id: String,
    /// Never empty
    pub url: String,
    pub bitrate_bps: u32,
    pub source: PlaybackSource,
}

/// Result of the lyrics operation; empty text means "not found"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricsResult {
    pub lyric_text: String,
}

// ============================================================================
// Wire envelopes
// ============================================================================

/// `GET /api/music/search` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEnvelope {
    pub result: SearchResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub songs: Vec<CanonicalTrack>,
    #[serde(rename = "songCount")]
    pub song_count: usize,
}

impl SearchEnvelope {
    /// Wrap songs; `songCount` always equals the number of songs
    pub fn new(songs: Vec<CanonicalTrack>) -> Self {
        let song_count = songs.len();
        Self {
            result: SearchResult { songs, song_count },
        }
    }
}

/// `GET /api/music/url` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlEnvelope {
    pub data: Vec<UrlEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlEntry {
    pub id: i64,
    pub url: String,
    pub br: u32,
}

impl From<&PlaybackResult> for UrlEnvelope {
    fn from(result: &PlaybackResult) -> Self {
        Self {
            data: vec![UrlEntry {
                id: leading_integer(&result.id),
                url: result.url.clone(),
                br: result.bitrate_bps,
            }],
        }
    }
}

/// `GET /api/music/lyric` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricEnvelope {
    pub lrc: LyricBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricBody {
    pub lyric: String,
}

impl From<LyricsResult> for LyricEnvelope {
    fn from(result: LyricsResult) -> Self {
        Self {
            lrc: LyricBody {
                lyric: result.lyric_text,
            },
        }
    }
}

/// Numeric reading of an identifier: its leading decimal digits, else 0
///
/// Alphanumeric "mid" identifiers therefore map to 0 unless they start with
/// digits. A digit run too long for `i64` saturates to `i64::MAX`.
pub fn leading_integer(id: &str) -> i64 {
    let trimmed = id.trim_start();
    let digits: &str = match trimmed.find(|c: char| !c.is_ascii_digit()) {
        Some(end) => &trimmed[..end],
        None => trimmed,
    };
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(i64::MAX)
}
