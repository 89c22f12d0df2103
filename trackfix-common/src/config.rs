//! Configuration file model and resolution
//!
//! Config file location follows the usual priority order:
//! 1. Command-line argument (highest priority)
//! 2. `TRACKFIX_CONFIG` environment variable
//! 3. `<config_dir>/trackfix/config.toml`
//!
//! A missing file is not fatal: a warning is logged and compiled defaults apply.
//! A file that exists but does not parse is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TRACKFIX_CONFIG";

/// TOML configuration file contents
///
/// Every policy value is optional here; the consuming crate owns the defaults
/// and the validation of what it finds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// AcoustID application key
    pub acoustid_api_key: Option<String>,
    /// Contact URL or e-mail sent in the MusicBrainz User-Agent
    pub musicbrainz_contact: Option<String>,
    /// Number of files processed concurrently in batch runs
    pub jobs: Option<usize>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// `[identification]` table
    pub identification: IdentificationSection,
    /// `[tags]` table
    pub tags: TagSection,
    /// `[rename]` table
    pub rename: RenameSection,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationSection {
    pub min_confidence: Option<f64>,
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSection {
    pub ensure_virtualdj_compat: Option<bool>,
    /// "passthrough" or "skip"
    pub on_identify_fail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameSection {
    pub enabled: Option<bool>,
    pub template: Option<String>,
    pub require_title_and_artist: Option<bool>,
}

/// Resolve which config file to load
///
/// Returns `None` only when no platform config directory exists and nothing
/// was given explicitly.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path()
}

/// `<config_dir>/trackfix/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("trackfix").join("config.toml"))
}

/// Load configuration, falling back to defaults when the file is absent
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        warn!("No config directory available, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        // An explicitly requested file must exist
        if cli_arg.is_some() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        warn!(path = %path.display(), "Config file not found, using compiled defaults");
        return Ok(TomlConfig::default());
    }

    load_config_file(&path)
}

/// Parse a specific TOML config file
pub fn load_config_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert!(config.acoustid_api_key.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.identification.min_confidence.is_none());
    }

    #[test]
    fn test_partial_tables_parse() {
        let config: TomlConfig = toml::from_str(
            r#"
            jobs = 4

            [identification]
            min_confidence = 0.8

            [rename]
            template = "{artist} - {title}"
            "#,
        )
        .unwrap();

        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.identification.min_confidence, Some(0.8));
        assert!(config.identification.max_candidates.is_none());
        assert_eq!(config.rename.template.as_deref(), Some("{artist} - {title}"));
        assert!(config.rename.enabled.is_none());
    }

    #[test]
    fn test_cli_arg_has_priority() {
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
