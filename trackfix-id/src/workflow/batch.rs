//! Batch driver
//!
//! Runs independent `process_file` invocations concurrently, at most one per
//! path, and aggregates their outcomes.

use super::pipeline::{Pipeline, ProcessOptions};
use crate::types::{PipelineResult, Reason};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Outcome for one input path
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// Present when the pipeline ran to completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PipelineResult>,
    /// Present when the initial tag read failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub identified: usize,
    pub by_reason: BTreeMap<Reason, usize>,
    pub wrote_tags: usize,
    pub renamed: usize,
    /// Files whose tags could not be read at all
    pub failed: usize,
    /// Absorbed collaborator failures across all files
    pub warnings: usize,
}

impl BatchStats {
    fn record(&mut self, outcome: &FileOutcome) {
        self.total += 1;
        match &outcome.result {
            Some(result) => {
                if result.identified {
                    self.identified += 1;
                }
                *self.by_reason.entry(result.reason).or_insert(0) += 1;
                if result.wrote_tags {
                    self.wrote_tags += 1;
                }
                if result.renamed {
                    self.renamed += 1;
                }
                self.warnings += result.warnings.len();
            }
            None => self.failed += 1,
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} files: {} identified, {} tagged, {} renamed, {} failed",
            self.total, self.identified, self.wrote_tags, self.renamed, self.failed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per distinct input path, in input order
    pub files: Vec<FileOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }
}

/// Process `paths` with up to `jobs` files in flight
///
/// Repeated paths (including different spellings of the same file) are
/// processed once.
pub async fn process_batch(
    pipeline: &Pipeline,
    paths: &[PathBuf],
    options: ProcessOptions,
    jobs: usize,
) -> BatchReport {
    let started_at = Utc::now();
    let unique = dedupe_paths(paths);
    let jobs = jobs.max(1);

    info!(files = unique.len(), jobs, "Starting batch");

    let mut files: Vec<(usize, FileOutcome)> = stream::iter(unique.into_iter().enumerate())
        .map(|(index, path)| async move {
            let outcome = match pipeline.process_file(&path, options).await {
                Ok(result) => FileOutcome {
                    path,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Could not read file");
                    FileOutcome {
                        path,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            (index, outcome)
        })
        .buffer_unordered(jobs)
        .collect()
        .await;

    files.sort_by_key(|(index, _)| *index);
    let files: Vec<FileOutcome> = files.into_iter().map(|(_, outcome)| outcome).collect();

    let mut stats = BatchStats::default();
    for outcome in &files {
        stats.record(outcome);
    }

    let finished_at = Utc::now();
    info!(
        elapsed_ms = (finished_at - started_at).num_milliseconds(),
        "{}",
        stats.display_string()
    );

    BatchReport {
        started_at,
        finished_at,
        files,
        stats,
    }
}

/// First occurrence of each file, compared by canonical path when it resolves
fn dedupe_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|path| seen.insert(identity(path)))
        .cloned()
        .collect()
}

fn identity(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        fs::write(&a, b"x").unwrap();
        fs::write(&b, b"x").unwrap();
        let a_again = dir.path().join(".").join("a.mp3");

        let unique = dedupe_paths(&[a.clone(), b.clone(), a_again, a.clone()]);
        assert_eq!(unique, vec![a, b]);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = BatchStats::default();
        stats.record(&FileOutcome {
            path: "x".into(),
            result: None,
            error: Some("boom".into()),
        });
        assert_eq!(stats.total, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.by_reason.is_empty());
    }
}
