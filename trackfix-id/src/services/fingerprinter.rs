//! Audio fingerprinting via Chromaprint's `fpcalc`
//!
//! Decoding and the fingerprint algorithm live in the external tool; this
//! module only runs it (with a time limit) and parses its JSON output.

use crate::error::FingerprintError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Chromaprint fingerprint plus the duration AcoustID needs alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    /// Compressed, base64-encoded fingerprint as produced by fpcalc
    pub fingerprint: String,
    /// Audio duration in whole seconds
    pub duration_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct FpcalcOutput {
    duration: f64,
    fingerprint: String,
}

/// Audio fingerprinter
pub struct Fingerprinter {
    fpcalc_path: PathBuf,
    /// Use first N seconds for fingerprinting (default: 120 seconds)
    length_seconds: u32,
    timeout: Duration,
}

impl Fingerprinter {
    /// Create new fingerprinter using `fpcalc` from `PATH`
    pub fn new() -> Self {
        Self {
            fpcalc_path: PathBuf::from("fpcalc"),
            length_seconds: 120, // AcoustID recommends 120 seconds
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.fpcalc_path = path.into();
        self
    }

    pub fn with_length(mut self, seconds: u32) -> Self {
        self.length_seconds = seconds;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fingerprint an audio file
    ///
    /// # Errors
    /// - `Undecodable` when fpcalc rejects the audio
    /// - `ToolUnavailable` when fpcalc cannot be started
    /// - `Timeout` when it runs longer than the configured limit
    pub async fn fingerprint_file(&self, audio_path: &Path) -> Result<Fingerprint, FingerprintError> {
        let child = Command::new(&self.fpcalc_path)
            .arg("-json")
            .arg("-length")
            .arg(self.length_seconds.to_string())
            .arg(audio_path)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| FingerprintError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| {
                FingerprintError::ToolUnavailable(format!(
                    "{}: {}",
                    self.fpcalc_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                format!("fpcalc exited with {}", output.status)
            } else {
                stderr
            };
            return Err(FingerprintError::Undecodable {
                path: audio_path.to_path_buf(),
                reason,
            });
        }

        let fingerprint = parse_fpcalc_output(&String::from_utf8_lossy(&output.stdout))?;

        tracing::debug!(
            file = %audio_path.display(),
            duration_s = fingerprint.duration_seconds,
            "Fingerprint generated"
        );
        Ok(fingerprint)
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `fpcalc -json` output
///
/// Some builds print warnings around the JSON object, so only the outermost
/// `{ ... }` span is parsed.
pub fn parse_fpcalc_output(stdout: &str) -> Result<Fingerprint, FingerprintError> {
    let (Some(start), Some(end)) = (stdout.find('{'), stdout.rfind('}')) else {
        return Err(FingerprintError::InvalidOutput(
            "no JSON object in fpcalc output".to_string(),
        ));
    };
    if end < start {
        return Err(FingerprintError::InvalidOutput(
            "malformed JSON object in fpcalc output".to_string(),
        ));
    }

    let parsed: FpcalcOutput = serde_json::from_str(&stdout[start..=end])
        .map_err(|e| FingerprintError::InvalidOutput(e.to_string()))?;

    if parsed.fingerprint.trim().is_empty() {
        return Err(FingerprintError::InvalidOutput("empty fingerprint".to_string()));
    }
    if !parsed.duration.is_finite() || parsed.duration <= 0.0 {
        return Err(FingerprintError::InvalidOutput(format!(
            "invalid duration {}",
            parsed.duration
        )));
    }

    Ok(Fingerprint {
        fingerprint: parsed.fingerprint,
        duration_seconds: parsed.duration.round() as u64,
    })
}
