//! trackfix-id library interface
//!
//! Policy-driven identification pipeline for audio files: read tags, identify
//! by fingerprint, fetch metadata, rewrite tags, rename. Exposed as a library
//! so each step can be driven on its own and so integration tests can inject
//! fake collaborators.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod utils;
pub mod workflow;

pub use crate::error::{
    ConfigurationError, FingerprintError, IdentifyError, MetadataLookupError, RenameError,
    TagError,
};
pub use crate::models::{FailMode, IdentificationPolicy, Policies, RenamePolicy, TagPolicy};
pub use crate::types::{
    Candidate, CandidateProvider, Metadata, MetadataProvider, PipelineResult, ProcessWarning,
    Reason, TagCodec, TagField, TagSnapshot, TagUpdates, TemplateValues,
};
pub use crate::workflow::{process_batch, BatchReport, Pipeline, ProcessOptions};
