//! Pipeline Orchestrator
//!
//! Sequences one file through read -> identify -> resolve -> write -> rename
//! under the three policies and produces exactly one `PipelineResult`.
//!
//! # State progression
//! START → TAGS_READ → {CONFIDENT, UNCONFIDENT, DISABLED} → METADATA_FETCHED
//! (confident only) → TAGS_WRITTEN? → RENAMED? → DONE
//!
//! # Error handling
//! - The initial tag read is the only failure returned as `Err`
//! - Identification, metadata, tag-write and rename failures are absorbed into
//!   the result (`reason`, booleans, `warnings`)
//! - Steps run strictly in order; tag write and rename touch the same file

use crate::error::TagError;
use crate::models::{FailMode, Policies};
use crate::services::identifier::{select_best, IdentifyOutcome, Identifier};
use crate::services::metadata_resolver::MetadataResolver;
use crate::services::renamer::Renamer;
use crate::services::tag_inspector::{merge_updates, passthrough_updates, TagInspector};
use crate::types::{
    template_values, Candidate, CandidateProvider, Metadata, MetadataProvider, PipelineResult,
    ProcessWarning, Reason, TagCodec, TagSnapshot, TagUpdates, TemplateValues,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-call switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Run the identifier; when false the file goes straight to the fallback branch
    pub do_identify: bool,
    /// Allow tag writes; when false no branch writes tags
    pub do_tag: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            do_identify: true,
            do_tag: true,
        }
    }
}

/// Where identification left us
enum Decision {
    Confident(Candidate, Metadata),
    Fallback(Reason),
}

/// Mutable state of one invocation, folded into the result at the end
struct Run {
    path_in: PathBuf,
    current_path: PathBuf,
    wrote_tags: bool,
    renamed: bool,
    chosen: Option<Candidate>,
    warnings: Vec<ProcessWarning>,
}

impl Run {
    fn new(path: &Path) -> Self {
        Self {
            path_in: path.to_path_buf(),
            current_path: path.to_path_buf(),
            wrote_tags: false,
            renamed: false,
            chosen: None,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(file = %self.path_in.display(), code, %message, "Step failed, continuing");
        self.warnings.push(ProcessWarning::new(code, message));
    }

    fn finish(self, identified: bool, reason: Reason) -> PipelineResult {
        let final_filename = self
            .current_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        PipelineResult {
            path_in: self.path_in,
            output_path: self.current_path,
            final_filename,
            identified,
            reason,
            wrote_tags: self.wrote_tags,
            renamed: self.renamed,
            confidence: self.chosen.as_ref().map(|c| c.confidence),
            chosen: self.chosen,
            warnings: self.warnings,
        }
    }
}

/// Pipeline orchestrator
#[derive(Clone)]
pub struct Pipeline {
    tags: TagInspector,
    identifier: Identifier,
    resolver: MetadataResolver,
    renamer: Renamer,
    policies: Policies,
}

impl Pipeline {
    /// Wire the collaborators together under `policies`
    pub fn new(
        codec: Arc<dyn TagCodec>,
        candidate_provider: Arc<dyn CandidateProvider>,
        metadata_provider: Arc<dyn MetadataProvider>,
        policies: Policies,
    ) -> Self {
        Self {
            tags: TagInspector::new(codec),
            identifier: Identifier::new(candidate_provider, policies.identification),
            resolver: MetadataResolver::new(metadata_provider),
            renamer: Renamer::new(),
            policies,
        }
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn tags(&self) -> &TagInspector {
        &self.tags
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    pub fn renamer(&self) -> &Renamer {
        &self.renamer
    }

    /// Process one file
    ///
    /// # Errors
    /// Only `TagError::Unreadable` from the initial read. Everything after
    /// that is reported through the returned `PipelineResult`.
    pub async fn process_file(
        &self,
        path: &Path,
        options: ProcessOptions,
    ) -> Result<PipelineResult, TagError> {
        debug!(file = %path.display(), ?options, "Processing file");

        let snapshot = self.tags.read(path)?;
        let mut run = Run::new(path);

        let decision = if options.do_identify {
            self.decide(path, &snapshot, &mut run).await
        } else {
            Decision::Fallback(Reason::IdentifyDisabled)
        };

        let result = match decision {
            Decision::Confident(candidate, metadata) => {
                self.confident_branch(&snapshot, &metadata, options, &mut run);
                debug!(recording_id = %candidate.recording_id, "Applied confident match");
                run.finish(true, Reason::Ok)
            }
            Decision::Fallback(reason) => {
                self.fallback_branch(&snapshot, options, &mut run);
                run.finish(false, reason)
            }
        };

        info!(
            file = %path.display(),
            reason = %result.reason,
            identified = result.identified,
            wrote_tags = result.wrote_tags,
            renamed = result.renamed,
            output = %result.final_filename,
            "File processed"
        );
        Ok(result)
    }

    /// Identify, gate on confidence, fetch metadata for a confident match
    async fn decide(&self, path: &Path, snapshot: &TagSnapshot, run: &mut Run) -> Decision {
        let candidates = match self.identifier.identify(path, Some(snapshot)).await {
            Ok(IdentifyOutcome::Candidates(candidates)) => candidates,
            Ok(IdentifyOutcome::NoCandidates) => return Decision::Fallback(Reason::NoCandidates),
            Ok(IdentifyOutcome::Undecodable(e)) => {
                run.warn("fingerprint_failed", e.to_string());
                return Decision::Fallback(Reason::NoCandidates);
            }
            Err(e) => {
                run.warn("identify_failed", e.to_string());
                return Decision::Fallback(Reason::NoCandidates);
            }
        };

        let Some(best) = select_best(&candidates).cloned() else {
            return Decision::Fallback(Reason::NoCandidates);
        };
        run.chosen = Some(best.clone());

        let policy = self.identifier.policy();
        if !policy.is_confident(best.confidence) {
            info!(
                file = %path.display(),
                confidence = best.confidence,
                min_confidence = policy.min_confidence(),
                "Best candidate below threshold"
            );
            return Decision::Fallback(Reason::LowConfidence);
        }

        match self.resolver.fetch(&best).await {
            Ok(metadata) => Decision::Confident(best, metadata),
            Err(e) => {
                run.warn("metadata_failed", e.to_string());
                Decision::Fallback(Reason::MetadataUnavailable)
            }
        }
    }

    fn confident_branch(
        &self,
        snapshot: &TagSnapshot,
        metadata: &Metadata,
        options: ProcessOptions,
        run: &mut Run,
    ) {
        if options.do_tag {
            self.write_tags(&merge_updates(snapshot, metadata), run);
        }

        self.rename(&metadata.template_values(), run);
    }

    fn fallback_branch(&self, snapshot: &TagSnapshot, options: ProcessOptions, run: &mut Run) {
        let existing = passthrough_updates(snapshot);

        if options.do_tag && self.policies.tag.on_identify_fail == FailMode::Passthrough {
            self.write_tags(&existing, run);
        }

        self.rename(&template_values(&existing), run);
    }

    fn write_tags(&self, updates: &TagUpdates, run: &mut Run) {
        match self.tags.write(
            &run.current_path,
            updates,
            self.policies.tag.ensure_virtualdj_compat,
        ) {
            Ok(()) => run.wrote_tags = true,
            Err(e) => run.warn("tag_write_failed", e.to_string()),
        }
    }

    /// Rename from `values`; title and artist count only when non-blank
    fn rename(&self, values: &TemplateValues, run: &mut Run) {
        let policy = &self.policies.rename;
        if !policy.allows(values.contains_key("title"), values.contains_key("artist")) {
            if policy.enabled() {
                debug!(file = %run.current_path.display(), "Rename skipped: title or artist missing");
            }
            return;
        }

        let applied = self
            .renamer
            .propose(&run.current_path, values, policy.template_str())
            .and_then(|proposal| self.renamer.apply(&proposal));

        match applied {
            Ok(new_path) => {
                run.renamed = new_path != run.current_path;
                run.current_path = new_path;
            }
            Err(e) => run.warn("rename_failed", e.to_string()),
        }
    }
}
