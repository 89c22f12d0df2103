//! Configuration file resolution and loading tests
//!
//! Tests that touch `TRACKFIX_CONFIG` are marked `#[serial]` so they never race
//! on the process environment.

use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;
use trackfix_common::config::{load_config, resolve_config_path, CONFIG_ENV_VAR};
use trackfix_common::Error;

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("from_env.toml");
    env::set_var(CONFIG_ENV_VAR, &config_path);

    let resolved = resolve_config_path(None);

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(config_path));
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    let temp_dir = TempDir::new().unwrap();
    env::set_var(CONFIG_ENV_VAR, temp_dir.path().join("from_env.toml"));

    let cli_path = temp_dir.path().join("from_cli.toml");
    let resolved = resolve_config_path(Some(&cli_path));

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(cli_path));
}

#[test]
#[serial]
fn test_missing_env_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    env::set_var(CONFIG_ENV_VAR, temp_dir.path().join("does_not_exist.toml"));

    let config = load_config(None);

    env::remove_var(CONFIG_ENV_VAR);
    let config = config.expect("missing config file must not be fatal");
    assert!(config.acoustid_api_key.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_missing_explicit_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nope.toml");

    let result = load_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.toml");
    fs::write(&path, "this is = = not toml").unwrap();

    let result = load_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_full_file_loads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
acoustid_api_key = "abc123"
musicbrainz_contact = "ops@example.org"

[logging]
level = "debug"

[identification]
min_confidence = 0.75
max_candidates = 3

[tags]
ensure_virtualdj_compat = false
on_identify_fail = "skip"

[rename]
enabled = true
template = "{artist} - {title}"
require_title_and_artist = false
"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.acoustid_api_key.as_deref(), Some("abc123"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.identification.max_candidates, Some(3));
    assert_eq!(config.tags.on_identify_fail.as_deref(), Some("skip"));
    assert_eq!(config.tags.ensure_virtualdj_compat, Some(false));
    assert_eq!(config.rename.require_title_and_artist, Some(false));
}
