//! Shared test utilities for trackfix-id integration tests
//!
//! Not every test file uses every helper.
#![allow(dead_code)]

pub mod audio_generator;
pub mod fakes;
