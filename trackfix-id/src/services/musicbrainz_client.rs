//! MusicBrainz API client
//!
//! Recording lookups against the MusicBrainz web service, plus the
//! `MusicBrainzProvider` that exposes them as the pipeline's `MetadataProvider`.

use crate::error::MetadataLookupError;
use crate::services::tag_inspector::normalize_year;
use crate::types::{Candidate, Metadata, MetadataProvider};
use crate::utils::{retry_transient, RateLimiter, RetryConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const RATE_LIMIT_MS: u64 = 1000; // 1 request per second

/// MusicBrainz client errors
#[derive(Debug, Error)]
pub enum MBError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Recording not found: {0}")]
    RecordingNotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl MBError {
    pub fn is_transient(&self) -> bool {
        match self {
            MBError::NetworkError(_) | MBError::RateLimitExceeded => true,
            MBError::ApiError(status, _) => *status >= 500,
            _ => false,
        }
    }
}

impl From<MBError> for MetadataLookupError {
    fn from(err: MBError) -> Self {
        match err {
            MBError::NetworkError(msg) => MetadataLookupError::NetworkError(msg),
            MBError::RecordingNotFound(id) => MetadataLookupError::RecordingNotFound(id),
            MBError::RateLimitExceeded => {
                MetadataLookupError::ApiError(503, "rate limit exceeded".to_string())
            }
            MBError::ApiError(status, msg) => MetadataLookupError::ApiError(status, msg),
            MBError::ParseError(msg) => MetadataLookupError::ParseError(msg),
        }
    }
}

/// MusicBrainz Recording response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRecording {
    /// Recording MBID (MusicBrainz ID)
    pub id: String,
    /// Recording title
    pub title: String,
    /// Recording length in milliseconds
    pub length: Option<u64>,
    /// Artist credits for this recording
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MBArtistCredit>,
    /// Releases containing this recording
    #[serde(default)]
    pub releases: Vec<MBRelease>,
    #[serde(default)]
    pub isrcs: Vec<String>,
    /// Folksonomy tags, used for genre
    #[serde(default)]
    pub tags: Vec<MBTag>,
}

/// MusicBrainz artist credit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtistCredit {
    /// Display name (may differ from artist.name for collaborations)
    pub name: String,
    /// Text joining this credit to the next one (" feat. ", " & ", ...)
    #[serde(default)]
    pub joinphrase: String,
    /// Artist information
    pub artist: MBArtist,
}

/// MusicBrainz artist
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtist {
    /// Artist MBID (MusicBrainz ID)
    pub id: String,
    /// Artist name
    pub name: String,
}

/// MusicBrainz release
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRelease {
    /// Release MBID (MusicBrainz ID)
    pub id: String,
    /// Release title
    pub title: String,
    /// Release date in YYYY-MM-DD format
    pub date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MBArtistCredit>,
    #[serde(default)]
    pub media: Vec<MBMedium>,
}

/// Medium (disc) of a release, restricted to the looked-up recording's track
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBMedium {
    pub position: Option<u32>,
    #[serde(rename = "track-count")]
    pub track_count: Option<u32>,
    #[serde(default, alias = "tracks")]
    pub track: Vec<MBTrack>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBTrack {
    pub number: Option<String>,
    pub position: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBTag {
    pub name: String,
    #[serde(default)]
    pub count: i64,
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl MusicBrainzClient {
    /// `contact` is appended to the User-Agent as MusicBrainz asks clients to do
    pub fn new(contact: Option<&str>) -> Result<Self, MBError> {
        let user_agent = match contact {
            Some(contact) if !contact.trim().is_empty() => format!(
                "trackfix/{} ( {} )",
                env!("CARGO_PKG_VERSION"),
                contact.trim()
            ),
            _ => format!("trackfix/{}", env!("CARGO_PKG_VERSION")),
        };

        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Lookup recording by MBID
    pub async fn lookup_recording(&self, mbid: &str) -> Result<MBRecording, MBError> {
        let recording = retry_transient(
            "musicbrainz recording lookup",
            self.retry,
            MBError::is_transient,
            || self.lookup_recording_once(mbid),
        )
        .await?;

        tracing::info!(
            mbid = %mbid,
            title = %recording.title,
            artist = %recording.artist_credit.first().map(|a| a.name.as_str()).unwrap_or("Unknown"),
            "Retrieved recording from MusicBrainz"
        );

        Ok(recording)
    }

    async fn lookup_recording_once(&self, mbid: &str) -> Result<MBRecording, MBError> {
        // Rate limit
        self.rate_limiter.wait().await;

        let url = format!(
            "{}/recording/{}?inc=artists+releases+isrcs+tags&fmt=json",
            MUSICBRAINZ_BASE_URL, mbid
        );

        tracing::debug!(mbid = %mbid, url = %url, "Querying MusicBrainz API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 404 {
            return Err(MBError::RecordingNotFound(mbid.to_string()));
        }

        if status == 503 {
            return Err(MBError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MBError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| MBError::ParseError(e.to_string()))
    }
}

/// Flatten a recording into the pipeline's metadata record
///
/// Album, year and numbering come from the first listed release.
pub fn metadata_from_recording(recording: &MBRecording) -> Metadata {
    let release = recording.releases.first();
    let medium = release.and_then(|r| r.media.first());
    let track = medium.and_then(|m| m.track.first());

    Metadata {
        title: non_empty(&recording.title),
        artist: join_credits(&recording.artist_credit),
        album: release.and_then(|r| non_empty(&r.title)),
        album_artist: release.and_then(|r| join_credits(&r.artist_credit)),
        year: release
            .and_then(|r| r.date.as_deref())
            .and_then(normalize_year),
        track_number: track.and_then(|t| {
            t.number
                .clone()
                .or_else(|| t.position.map(|p| p.to_string()))
        }),
        track_total: medium.and_then(|m| m.track_count).map(|c| c.to_string()),
        disc_number: medium.and_then(|m| m.position).map(|p| p.to_string()),
        genre: best_genre(&recording.tags),
        isrc: recording.isrcs.first().cloned(),
        recording_id: Some(recording.id.clone()),
    }
}

fn join_credits(credits: &[MBArtistCredit]) -> Option<String> {
    let joined: String = credits
        .iter()
        .map(|c| format!("{}{}", c.name, c.joinphrase))
        .collect();
    non_empty(&joined)
}

/// Highest-count tag; earlier tags win ties
fn best_genre(tags: &[MBTag]) -> Option<String> {
    tags.iter()
        .filter(|t| !t.name.trim().is_empty())
        .fold(None, |best: Option<&MBTag>, t| match best {
            Some(b) if t.count <= b.count => Some(b),
            _ => Some(t),
        })
        .map(|t| t.name.clone())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// MusicBrainz recordings as a `MetadataProvider`
pub struct MusicBrainzProvider {
    client: MusicBrainzClient,
}

impl MusicBrainzProvider {
    pub fn new(client: MusicBrainzClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl MetadataProvider for MusicBrainzProvider {
    fn name(&self) -> &'static str {
        "MusicBrainz"
    }

    async fn fetch(&self, candidate: &Candidate) -> Result<Metadata, MetadataLookupError> {
        let recording = self.client.lookup_recording(&candidate.recording_id).await?;
        Ok(metadata_from_recording(&recording))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "rec-1",
        "title": "Around the World",
        "length": 429000,
        "artist-credit": [
            {"name": "Daft Punk", "joinphrase": " & ", "artist": {"id": "a1", "name": "Daft Punk"}},
            {"name": "Guest", "joinphrase": "", "artist": {"id": "a2", "name": "Guest"}}
        ],
        "releases": [
            {
                "id": "rel-1",
                "title": "Homework",
                "date": "1997-01-20",
                "media": [{"position": 1, "track-count": 16, "track": [{"number": "7", "position": 7}]}]
            },
            {"id": "rel-2", "title": "Musique Vol. 1", "date": "2006"}
        ],
        "isrcs": ["GBDUW9700007"],
        "tags": [
            {"name": "electronic", "count": 3},
            {"name": "house", "count": 7},
            {"name": "french house", "count": 7}
        ]
    }"#;

    #[test]
    fn test_metadata_from_recording() {
        let recording: MBRecording = serde_json::from_str(SAMPLE).unwrap();
        let meta = metadata_from_recording(&recording);

        assert_eq!(meta.title.as_deref(), Some("Around the World"));
        assert_eq!(meta.artist.as_deref(), Some("Daft Punk & Guest"));
        assert_eq!(meta.album.as_deref(), Some("Homework"));
        assert_eq!(meta.year.as_deref(), Some("1997"));
        assert_eq!(meta.track_number.as_deref(), Some("7"));
        assert_eq!(meta.track_total.as_deref(), Some("16"));
        assert_eq!(meta.disc_number.as_deref(), Some("1"));
        assert_eq!(meta.genre.as_deref(), Some("house"));
        assert_eq!(meta.isrc.as_deref(), Some("GBDUW9700007"));
        assert_eq!(meta.recording_id.as_deref(), Some("rec-1"));
    }

    #[test]
    fn test_sparse_recording() {
        let recording: MBRecording =
            serde_json::from_str(r#"{"id": "rec-2", "title": "Untitled"}"#).unwrap();
        let meta = metadata_from_recording(&recording);

        assert_eq!(meta.title.as_deref(), Some("Untitled"));
        assert!(meta.artist.is_none());
        assert!(meta.album.is_none());
        assert!(meta.genre.is_none());
    }

    #[test]
    fn test_error_mapping() {
        let err: MetadataLookupError = MBError::RecordingNotFound("x".into()).into();
        assert!(matches!(err, MetadataLookupError::RecordingNotFound(id) if id == "x"));
        assert!(MBError::RateLimitExceeded.is_transient());
        assert!(!MBError::RecordingNotFound("x".into()).is_transient());
    }

    #[test]
    fn test_client_creation() {
        assert!(MusicBrainzClient::new(Some("ops@example.org")).is_ok());
        assert!(MusicBrainzClient::new(None).is_ok());
    }
}
