//! Per-file decision pipeline and the batch driver around it

pub mod batch;
pub mod pipeline;

pub use batch::{process_batch, BatchReport, BatchStats, FileOutcome};
pub use pipeline::{Pipeline, ProcessOptions};
