//! Configuration objects for the pipeline

pub mod policies;

pub use policies::{
    FailMode, IdentificationPolicy, Policies, RenamePolicy, TagPolicy, DEFAULT_MAX_CANDIDATES,
    DEFAULT_MIN_CONFIDENCE, DEFAULT_TEMPLATE,
};
