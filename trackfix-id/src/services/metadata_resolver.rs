//! Metadata Resolver
//!
//! Turns the chosen candidate into a normalized `Metadata` record. One call to
//! the metadata collaborator per fetch; transport retries live in the client.

use crate::error::MetadataLookupError;
use crate::types::{Candidate, Metadata, MetadataProvider};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct MetadataResolver {
    provider: Arc<dyn MetadataProvider>,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self { provider }
    }

    /// Metadata for `candidate`
    ///
    /// Values are trimmed and blank strings become `None`, so callers can rely
    /// on `Some` meaning "has content".
    pub async fn fetch(&self, candidate: &Candidate) -> Result<Metadata, MetadataLookupError> {
        debug!(
            provider = self.provider.name(),
            recording_id = %candidate.recording_id,
            "Fetching metadata"
        );

        let metadata = self.provider.fetch(candidate).await.map_err(|e| {
            warn!(
                provider = self.provider.name(),
                recording_id = %candidate.recording_id,
                error = %e,
                "Metadata lookup failed"
            );
            e
        })?;

        let mut metadata = normalize_metadata(metadata);
        if metadata.recording_id.is_none() {
            metadata.recording_id = Some(candidate.recording_id.clone());
        }
        Ok(metadata)
    }
}

fn normalize_metadata(metadata: Metadata) -> Metadata {
    let clean = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Metadata {
        title: clean(metadata.title),
        artist: clean(metadata.artist),
        album: clean(metadata.album),
        album_artist: clean(metadata.album_artist),
        year: clean(metadata.year),
        track_number: clean(metadata.track_number),
        track_total: clean(metadata.track_total),
        disc_number: clean(metadata.disc_number),
        genre: clean(metadata.genre),
        isrc: clean(metadata.isrc),
        recording_id: clean(metadata.recording_id),
    }
}
