//! Error taxonomy for the identification pipeline
//!
//! One enum per component, so call sites can tell "the audio is unreadable"
//! apart from "the provider is down" without string matching.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid policy values, raised by the validating constructors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("min_confidence must be in (0, 1], got {0}")]
    MinConfidenceOutOfRange(f64),

    #[error("max_candidates must be at least 1, got {0}")]
    MaxCandidatesTooSmall(usize),

    #[error("unknown on_identify_fail mode '{0}' (expected 'passthrough' or 'skip')")]
    UnknownFailMode(String),

    #[error("rename template must not be empty")]
    EmptyTemplate,
}

/// Fingerprint collaborator errors
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The audio stream could not be decoded (corrupt or unsupported input)
    #[error("Failed to decode audio {path}: {reason}")]
    Undecodable { path: PathBuf, reason: String },

    /// The fingerprint tool is not installed or could not be started
    #[error("Fingerprint tool unavailable: {0}")]
    ToolUnavailable(String),

    /// The fingerprint tool did not finish in time
    #[error("Fingerprinting timed out after {0} seconds")]
    Timeout(u64),

    /// The fingerprint tool produced output we could not parse
    #[error("Invalid fingerprint output: {0}")]
    InvalidOutput(String),
}

/// Identifier failures
///
/// Expected "no match" results are not errors; see `IdentifyOutcome`.
#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// Lookup provider failure (network, API, parse)
    #[error("Identification provider error: {0}")]
    Provider(String),
}

/// Metadata collaborator errors
#[derive(Debug, Error)]
pub enum MetadataLookupError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Recording not found: {0}")]
    RecordingNotFound(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Tag codec errors
#[derive(Debug, Error)]
pub enum TagError {
    /// The container could not be parsed (UnreadableFileError)
    #[error("Unreadable file {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// The tag block could not be written (TagWriteError); the original file is untouched
    #[error("Tag write failed for {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Renamer errors
#[derive(Debug, Error)]
pub enum RenameError {
    /// Every numbered suffix was taken (RenameCollisionError)
    #[error("No free name for {dest} after {attempts} attempts")]
    Collision { dest: PathBuf, attempts: u32 },

    /// Filesystem failure while renaming (permissions, missing source, ...)
    #[error("Rename of {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source path has no parent directory or file name
    #[error("Invalid source path: {0}")]
    InvalidPath(PathBuf),
}

impl TagError {
    pub fn path(&self) -> &PathBuf {
        match self {
            TagError::Unreadable { path, .. } | TagError::Write { path, .. } => path,
        }
    }
}
