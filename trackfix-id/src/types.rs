//! Core types and collaborator trait definitions
//!
//! The pipeline talks to three external collaborators through the traits at the
//! bottom of this module:
//! - **TagCodec** - reads and writes a file's tag block
//! - **CandidateProvider** - fingerprints a file and returns scored recording matches
//! - **MetadataProvider** - resolves a chosen recording into a metadata record
//!
//! Everything here is created per file and dropped when that file is done.

use crate::error::{IdentifyError, MetadataLookupError, TagError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Tag model
// ============================================================================

/// Normalised tag field names, independent of container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagField {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Year,
    Genre,
    Comment,
    Isrc,
    TrackNumber,
    TrackTotal,
    DiscNumber,
    DiscTotal,
    Bpm,
}

impl TagField {
    pub const ALL: [TagField; 13] = [
        TagField::Title,
        TagField::Artist,
        TagField::Album,
        TagField::AlbumArtist,
        TagField::Year,
        TagField::Genre,
        TagField::Comment,
        TagField::Isrc,
        TagField::TrackNumber,
        TagField::TrackTotal,
        TagField::DiscNumber,
        TagField::DiscTotal,
        TagField::Bpm,
    ];

    /// Name used in templates, dumps and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            TagField::Title => "title",
            TagField::Artist => "artist",
            TagField::Album => "album",
            TagField::AlbumArtist => "album_artist",
            TagField::Year => "year",
            TagField::Genre => "genre",
            TagField::Comment => "comment",
            TagField::Isrc => "isrc",
            TagField::TrackNumber => "track_number",
            TagField::TrackTotal => "track_total",
            TagField::DiscNumber => "disc_number",
            TagField::DiscTotal => "disc_total",
            TagField::Bpm => "bpm",
        }
    }
}

impl fmt::Display for TagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field -> value mapping to be written to a file
pub type TagUpdates = BTreeMap<TagField, String>;

/// Values available to rename templates, keyed by placeholder name
pub type TemplateValues = BTreeMap<String, String>;

/// Build template values from a tag mapping, skipping blank values
pub fn template_values(updates: &TagUpdates) -> TemplateValues {
    updates
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.as_str().to_string(), v.clone()))
        .collect()
}

/// Tag state of one file at one point in time
///
/// Produced only by the tag inspector; never mutated after the read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSnapshot {
    path: PathBuf,
    container: String,
    tags: BTreeMap<TagField, String>,
    has_artwork: bool,
}

impl TagSnapshot {
    pub fn new(
        path: impl Into<PathBuf>,
        container: impl Into<String>,
        tags: BTreeMap<TagField, String>,
        has_artwork: bool,
    ) -> Self {
        Self {
            path: path.into(),
            container: container.into(),
            tags,
            has_artwork,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detected container/codec ("MP3", "FLAC", ...)
    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn tags(&self) -> &BTreeMap<TagField, String> {
        &self.tags
    }

    pub fn get(&self, field: TagField) -> Option<&str> {
        self.tags.get(&field).map(String::as_str)
    }

    pub fn has_artwork(&self) -> bool {
        self.has_artwork
    }
}

// ============================================================================
// Identification model
// ============================================================================

/// One provider-suggested recording match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// External recording identifier (MusicBrainz recording MBID)
    pub recording_id: String,
    /// Match confidence in [0.0, 1.0]
    pub confidence: f64,
    /// Raw provider payload, opaque to the pipeline
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Candidate {
    /// Create a candidate with confidence clamped to [0.0, 1.0]
    pub fn new(recording_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            recording_id: recording_id.into(),
            confidence: confidence.clamp(0.0, 1.0),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Normalised metadata for a recording
///
/// Every field is optional; absence is not an error. Missing title or artist
/// only affects rename eligibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<String>,
    pub track_number: Option<String>,
    pub track_total: Option<String>,
    pub disc_number: Option<String>,
    pub genre: Option<String>,
    pub isrc: Option<String>,
    /// Identifier of the recording this record describes
    pub recording_id: Option<String>,
}

impl Metadata {
    /// Project the record onto tag fields, dropping blank values
    pub fn to_tag_updates(&self) -> TagUpdates {
        let pairs = [
            (TagField::Title, &self.title),
            (TagField::Artist, &self.artist),
            (TagField::Album, &self.album),
            (TagField::AlbumArtist, &self.album_artist),
            (TagField::Year, &self.year),
            (TagField::TrackNumber, &self.track_number),
            (TagField::TrackTotal, &self.track_total),
            (TagField::DiscNumber, &self.disc_number),
            (TagField::Genre, &self.genre),
            (TagField::Isrc, &self.isrc),
        ];

        pairs
            .into_iter()
            .filter_map(|(field, value)| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (field, v.to_string()))
            })
            .collect()
    }

    pub fn template_values(&self) -> TemplateValues {
        template_values(&self.to_tag_updates())
    }
}

// ============================================================================
// Pipeline result
// ============================================================================

/// Why the pipeline ended on the branch it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Confident match; tags and name come from fetched metadata
    Ok,
    /// Provider returned nothing usable (or the audio could not be fingerprinted)
    NoCandidates,
    /// Best candidate fell below the confidence threshold
    LowConfidence,
    /// Identification was switched off for this call
    IdentifyDisabled,
    /// Confident match, but its metadata could not be fetched
    MetadataUnavailable,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Ok => "ok",
            Reason::NoCandidates => "no_candidates",
            Reason::LowConfidence => "low_confidence",
            Reason::IdentifyDisabled => "identify_disabled",
            Reason::MetadataUnavailable => "metadata_unavailable",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collaborator failure that was absorbed into the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessWarning {
    pub code: String,
    pub message: String,
}

impl ProcessWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Outcome of one `process_file` call; produced exactly once per call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    /// Path the call was made with
    pub path_in: PathBuf,
    /// Where the file lives now (same as `path_in` unless renamed)
    pub output_path: PathBuf,
    /// File name component of `output_path`
    pub final_filename: String,
    pub identified: bool,
    pub reason: Reason,
    pub wrote_tags: bool,
    pub renamed: bool,
    /// Score of the best candidate seen, if any
    pub confidence: Option<f64>,
    /// Best candidate seen, if any
    pub chosen: Option<Candidate>,
    pub warnings: Vec<ProcessWarning>,
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Low-level tag reader/writer
pub trait TagCodec: Send + Sync {
    /// Read the file's current tags
    ///
    /// # Errors
    /// `TagError::Unreadable` when the container cannot be parsed.
    fn read(&self, path: &Path) -> Result<TagSnapshot, TagError>;

    /// Set every field in `updates`, leaving other fields alone
    ///
    /// Must be all-or-nothing with respect to the file. With
    /// `ensure_virtualdj_compat` the codec also picks the container layout
    /// VirtualDJ reads (ID3v2.3 for ID3 tags).
    fn write(
        &self,
        path: &Path,
        updates: &TagUpdates,
        ensure_virtualdj_compat: bool,
    ) -> Result<(), TagError>;
}

/// Fingerprint + lookup provider
#[async_trait::async_trait]
pub trait CandidateProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Return matches in provider order; an empty Vec means "no result"
    ///
    /// # Errors
    /// `IdentifyError::Fingerprint` when the audio cannot be decoded,
    /// `IdentifyError::Provider` on lookup failure or when the fingerprint tool
    /// itself is missing or misbehaves.
    async fn lookup(
        &self,
        path: &Path,
        snapshot: Option<&TagSnapshot>,
    ) -> Result<Vec<Candidate>, IdentifyError>;
}

/// Recording metadata provider
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Fetch metadata for a candidate; must be deterministic per recording id
    async fn fetch(&self, candidate: &Candidate) -> Result<Metadata, MetadataLookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_confidence_clamped() {
        assert_eq!(Candidate::new("a", 1.5).confidence, 1.0);
        assert_eq!(Candidate::new("b", -0.2).confidence, 0.0);
        assert_eq!(Candidate::new("c", 0.42).confidence, 0.42);
    }

    #[test]
    fn test_metadata_updates_skip_blanks() {
        let meta = Metadata {
            title: Some("  Song ".to_string()),
            artist: Some("".to_string()),
            year: Some("2001".to_string()),
            ..Default::default()
        };

        let updates = meta.to_tag_updates();
        assert_eq!(updates.get(&TagField::Title).map(String::as_str), Some("Song"));
        assert!(!updates.contains_key(&TagField::Artist));
        assert_eq!(updates.get(&TagField::Year).map(String::as_str), Some("2001"));
        assert!(!meta.template_values().contains_key("artist"));
    }

    #[test]
    fn test_template_values_use_field_names() {
        let meta = Metadata {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            track_number: Some("4".to_string()),
            ..Default::default()
        };

        let values = meta.template_values();
        assert_eq!(values.get("title").map(String::as_str), Some("Song"));
        assert_eq!(values.get("artist").map(String::as_str), Some("Band"));
        assert_eq!(values.get("track_number").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&Reason::IdentifyDisabled).unwrap();
        assert_eq!(json, "\"identify_disabled\"");
        assert_eq!(Reason::NoCandidates.to_string(), "no_candidates");
    }
}
