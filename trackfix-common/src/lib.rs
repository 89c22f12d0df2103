//! # trackfix Common Library
//!
//! Shared code for the trackfix binaries including:
//! - Common error and result types
//! - TOML configuration model and config file resolution
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
