//! Scripted collaborators
//!
//! Deterministic stand-ins for the tag codec, the fingerprint/lookup provider
//! and the metadata provider, with call recording for assertions.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use trackfix_id::error::{FingerprintError, IdentifyError, MetadataLookupError, TagError};
use trackfix_id::types::{
    Candidate, CandidateProvider, Metadata, MetadataProvider, TagCodec, TagField, TagSnapshot,
    TagUpdates,
};

/// In-memory tag store keyed by path
///
/// The audio files themselves are real (so renames can happen on disk); only
/// their tags live here.
#[derive(Default)]
pub struct MemoryTagCodec {
    files: Mutex<HashMap<PathBuf, BTreeMap<TagField, String>>>,
    writes: Mutex<Vec<(PathBuf, TagUpdates)>>,
    compat_flags: Mutex<Vec<bool>>,
    fail_writes: bool,
}

impl MemoryTagCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails with `TagError::Write`
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, path: &Path, tags: &[(TagField, &str)]) {
        let tags = tags.iter().map(|(f, v)| (*f, v.to_string())).collect();
        self.files.lock().unwrap().insert(path.to_path_buf(), tags);
    }

    pub fn tags_of(&self, path: &Path) -> Option<BTreeMap<TagField, String>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    /// The VirtualDJ flag each write was called with, in order
    pub fn compat_flags(&self) -> Vec<bool> {
        self.compat_flags.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(PathBuf, TagUpdates)> {
        self.writes.lock().unwrap().clone()
    }

    /// Carry the entry along after a rename
    pub fn follow_rename(&self, from: &Path, to: &Path) {
        let mut files = self.files.lock().unwrap();
        if let Some(tags) = files.remove(from) {
            files.insert(to.to_path_buf(), tags);
        }
    }
}

impl TagCodec for MemoryTagCodec {
    fn read(&self, path: &Path) -> Result<TagSnapshot, TagError> {
        let files = self.files.lock().unwrap();
        let tags = files.get(path).cloned().ok_or_else(|| TagError::Unreadable {
            path: path.to_path_buf(),
            reason: "not in memory store".to_string(),
        })?;
        Ok(TagSnapshot::new(path.to_path_buf(), "MEMORY", tags, false))
    }

    fn write(
        &self,
        path: &Path,
        updates: &TagUpdates,
        ensure_virtualdj_compat: bool,
    ) -> Result<(), TagError> {
        if self.fail_writes {
            return Err(TagError::Write {
                path: path.to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }
        self.writes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), updates.clone()));
        self.compat_flags.lock().unwrap().push(ensure_virtualdj_compat);

        let mut files = self.files.lock().unwrap();
        let entry = files.entry(path.to_path_buf()).or_default();
        for (field, value) in updates {
            entry.insert(*field, value.clone());
        }
        Ok(())
    }
}

/// What the candidate provider answers
#[derive(Clone)]
pub enum Script {
    Candidates(Vec<Candidate>),
    Undecodable,
    ProviderDown,
}

pub struct ScriptedCandidates {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedCandidates {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(pairs: &[(&str, f64)]) -> Self {
        Self::new(Script::Candidates(
            pairs.iter().map(|(id, c)| Candidate::new(*id, *c)).collect(),
        ))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CandidateProvider for ScriptedCandidates {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn lookup(
        &self,
        path: &Path,
        _snapshot: Option<&TagSnapshot>,
    ) -> Result<Vec<Candidate>, IdentifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Candidates(candidates) => Ok(candidates.clone()),
            Script::Undecodable => Err(FingerprintError::Undecodable {
                path: path.to_path_buf(),
                reason: "scripted".to_string(),
            }
            .into()),
            Script::ProviderDown => Err(IdentifyError::Provider("scripted outage".to_string())),
        }
    }
}

/// Metadata keyed by recording id; unknown ids are `RecordingNotFound`
#[derive(Default)]
pub struct ScriptedMetadata {
    records: HashMap<String, Metadata>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, recording_id: &str, metadata: Metadata) -> Self {
        self.records.insert(recording_id.to_string(), metadata);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MetadataProvider for ScriptedMetadata {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, candidate: &Candidate) -> Result<Metadata, MetadataLookupError> {
        self.requested
            .lock()
            .unwrap()
            .push(candidate.recording_id.clone());
        self.records
            .get(&candidate.recording_id)
            .cloned()
            .ok_or_else(|| MetadataLookupError::RecordingNotFound(candidate.recording_id.clone()))
    }
}

pub fn metadata(title: Option<&str>, artist: Option<&str>) -> Metadata {
    Metadata {
        title: title.map(String::from),
        artist: artist.map(String::from),
        album: Some("Album".to_string()),
        year: Some("1999".to_string()),
        track_number: Some("3".to_string()),
        ..Default::default()
    }
}
