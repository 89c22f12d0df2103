//! Identifier
//!
//! Calls the fingerprint+lookup collaborator once per file and turns its raw
//! answer into a ranked, truncated candidate list.
//!
//! Ranking is deterministic: confidence descending, provider order kept on
//! ties (stable sort), a recording listed twice keeps its first-seen entry.

use crate::error::{FingerprintError, IdentifyError};
use crate::models::IdentificationPolicy;
use crate::types::{Candidate, CandidateProvider, TagSnapshot};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Expected identification outcomes
///
/// Only provider/transport failures are reported as `Err`; everything a caller
/// is expected to branch on is a variant here.
#[derive(Debug)]
pub enum IdentifyOutcome {
    /// Ranked, non-empty candidate list
    Candidates(Vec<Candidate>),
    /// Provider answered with nothing usable
    NoCandidates,
    /// Audio could not be decoded for fingerprinting
    Undecodable(FingerprintError),
}

/// Identifier service
#[derive(Clone)]
pub struct Identifier {
    provider: Arc<dyn CandidateProvider>,
    policy: IdentificationPolicy,
}

impl Identifier {
    pub fn new(provider: Arc<dyn CandidateProvider>, policy: IdentificationPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &IdentificationPolicy {
        &self.policy
    }

    /// Ranked candidates for `path`, at most `max_candidates` long
    ///
    /// An empty Vec is a normal "no result".
    ///
    /// # Errors
    /// `IdentifyError::Fingerprint` for undecodable audio, `IdentifyError::Provider`
    /// for lookup failures.
    pub async fn candidates(
        &self,
        path: &Path,
        snapshot: Option<&TagSnapshot>,
    ) -> Result<Vec<Candidate>, IdentifyError> {
        let raw = self.provider.lookup(path, snapshot).await?;
        let raw_count = raw.len();
        let ranked = rank_candidates(raw, self.policy.max_candidates());

        debug!(
            file = %path.display(),
            provider = self.provider.name(),
            raw = raw_count,
            kept = ranked.len(),
            "Ranked candidates"
        );
        Ok(ranked)
    }

    /// Same lookup as [`Identifier::candidates`], folded into an outcome
    pub async fn identify(
        &self,
        path: &Path,
        snapshot: Option<&TagSnapshot>,
    ) -> Result<IdentifyOutcome, IdentifyError> {
        match self.candidates(path, snapshot).await {
            Ok(candidates) if candidates.is_empty() => {
                info!(file = %path.display(), "No candidates");
                Ok(IdentifyOutcome::NoCandidates)
            }
            Ok(candidates) => Ok(IdentifyOutcome::Candidates(candidates)),
            Err(IdentifyError::Fingerprint(e)) => Ok(IdentifyOutcome::Undecodable(e)),
            Err(e) => Err(e),
        }
    }
}

/// Sort, de-duplicate and truncate a raw provider answer
///
/// Non-finite scores are discarded and the rest clamped into [0, 1].
pub fn rank_candidates(raw: Vec<Candidate>, max_candidates: usize) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<Candidate> = raw
        .into_iter()
        .filter(|c| c.confidence.is_finite() && !c.recording_id.trim().is_empty())
        // Dedupe in provider order, before sorting
        .filter(|c| seen.insert(c.recording_id.clone()))
        .map(|mut c| {
            c.confidence = c.confidence.clamp(0.0, 1.0);
            c
        })
        .collect();

    // sort_by is stable: equal scores keep provider order
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.truncate(max_candidates);
    candidates
}

/// Highest-confidence candidate; the first one seen wins a tie
pub fn select_best(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().fold(None, |best: Option<&Candidate>, c| match best {
        Some(b) if c.confidence <= b.confidence => Some(b),
        _ => Some(c),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cands(pairs: &[(&str, f64)]) -> Vec<Candidate> {
        pairs.iter().map(|(id, c)| Candidate::new(*id, *c)).collect()
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.recording_id.as_str()).collect()
    }

    #[test]
    fn test_rank_sorts_descending_stable() {
        let ranked = rank_candidates(
            cands(&[("a", 0.5), ("b", 0.9), ("c", 0.9), ("d", 0.7)]),
            10,
        );
        assert_eq!(ids(&ranked), vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_rank_truncates_after_sorting() {
        let ranked = rank_candidates(cands(&[("a", 0.1), ("b", 0.2), ("c", 0.3)]), 2);
        assert_eq!(ids(&ranked), vec!["c", "b"]);
    }

    #[test]
    fn test_rank_keeps_first_seen_duplicate_and_drops_nan() {
        let mut raw = cands(&[("a", 0.4), ("b", 0.6), ("a", 0.8)]);
        raw.push(Candidate {
            recording_id: "nan".to_string(),
            confidence: f64::NAN,
            payload: serde_json::Value::Null,
        });

        let ranked = rank_candidates(raw, 5);
        assert_eq!(ids(&ranked), vec!["b", "a"]);
        assert_eq!(ranked[1].confidence, 0.4);
    }

    #[test]
    fn test_select_best_first_seen_wins_tie() {
        let list = cands(&[("x", 0.7), ("y", 0.95), ("z", 0.95)]);
        assert_eq!(select_best(&list).map(|c| c.recording_id.as_str()), Some("y"));
        assert!(select_best(&[]).is_none());
    }
}
