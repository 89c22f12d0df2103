//! Policy and credential resolution for the `trackfix` binary
//!
//! The pipeline takes policies as values. This module builds them from the
//! TOML file (after the CLI has folded its overrides in) and resolves the
//! AcoustID key with ENV → TOML priority.

use crate::error::ConfigurationError;
use crate::models::{
    FailMode, IdentificationPolicy, Policies, RenamePolicy, TagPolicy, DEFAULT_MAX_CANDIDATES,
    DEFAULT_MIN_CONFIDENCE, DEFAULT_TEMPLATE,
};
use trackfix_common::config::TomlConfig;
use trackfix_common::{Error, Result};
use tracing::{info, warn};

/// Environment variable holding the AcoustID application key
pub const ACOUSTID_KEY_ENV_VAR: &str = "TRACKFIX_ACOUSTID_API_KEY";

/// Default number of files processed concurrently
pub const DEFAULT_JOBS: usize = 4;

/// Build validated policies from the config file, compiled defaults filling gaps
pub fn policies_from_config(config: &TomlConfig) -> std::result::Result<Policies, ConfigurationError> {
    let id = &config.identification;
    let identification = IdentificationPolicy::new(
        id.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
        id.max_candidates.unwrap_or(DEFAULT_MAX_CANDIDATES),
    )?;

    let on_identify_fail = match config.tags.on_identify_fail.as_deref() {
        Some(mode) => mode.parse::<FailMode>()?,
        None => FailMode::default(),
    };
    let tag = TagPolicy::new(
        config.tags.ensure_virtualdj_compat.unwrap_or(true),
        on_identify_fail,
    );

    let rename = RenamePolicy::new(
        config.rename.enabled.unwrap_or(true),
        config
            .rename
            .template
            .clone()
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
        config.rename.require_title_and_artist.unwrap_or(true),
    )?;

    Ok(Policies {
        identification,
        tag,
        rename,
    })
}

/// Concurrency for batch runs (never zero)
pub fn jobs_from_config(config: &TomlConfig) -> usize {
    config.jobs.unwrap_or(DEFAULT_JOBS).max(1)
}

/// Resolve the AcoustID API key
///
/// **Priority:** ENV → TOML
pub fn resolve_acoustid_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(ACOUSTID_KEY_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .acoustid_api_key
        .as_deref()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("AcoustID API key found in environment and TOML config. Using environment.");
    }

    if let Some(key) = env_key {
        info!("AcoustID API key loaded from environment variable");
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("AcoustID API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "AcoustID API key not configured. Set {}=your-key or add \
         acoustid_api_key = \"your-key\" to the config file. \
         Obtain a key at https://acoustid.org/new-application",
        ACOUSTID_KEY_ENV_VAR
    )))
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
