//! AcoustID API client
//!
//! Fingerprint lookup against the AcoustID web service, plus the
//! `AcoustIdProvider` that combines it with `Fingerprinter` into the pipeline's
//! `CandidateProvider`.

use crate::error::{FingerprintError, IdentifyError};
use crate::services::fingerprinter::Fingerprinter;
use crate::types::{Candidate, CandidateProvider, TagSnapshot};
use crate::utils::{retry_transient, RateLimiter, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const ACOUSTID_BASE_URL: &str = "https://api.acoustid.org/v2/lookup";
const USER_AGENT: &str = concat!("trackfix/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_MS: u64 = 334; // 3 requests per second (~333ms between requests)

/// AcoustID client errors
#[derive(Debug, Error)]
pub enum AcoustIDError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid API key")]
    InvalidApiKey,
}

impl AcoustIDError {
    /// Worth another attempt: connection problems, throttling, server errors
    pub fn is_transient(&self) -> bool {
        match self {
            AcoustIDError::NetworkError(_) => true,
            AcoustIDError::ApiError(status, _) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// AcoustID lookup response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcoustIDResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<AcoustIDResult>,
    pub error: Option<AcoustIDApiError>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcoustIDApiError {
    pub code: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcoustIDResult {
    pub id: String, // AcoustID
    pub score: f64, // Match confidence (0.0 to 1.0)
    pub recordings: Option<Vec<AcoustIDRecording>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcoustIDRecording {
    pub id: String, // MusicBrainz Recording MBID
    pub title: Option<String>,
    pub artists: Option<Vec<AcoustIDArtist>>,
    pub duration: Option<f64>, // Seconds
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcoustIDArtist {
    pub id: String, // MusicBrainz Artist MBID
    pub name: String,
}

/// AcoustID API client
pub struct AcoustIDClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    api_key: String,
    retry: RetryConfig,
}

impl AcoustIDClient {
    pub fn new(api_key: String) -> Result<Self, AcoustIDError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AcoustIDError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            api_key,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Lookup recordings by Chromaprint fingerprint
    ///
    /// An empty `results` list is returned as-is; it is not an error.
    pub async fn lookup(
        &self,
        fingerprint: &str,
        duration_seconds: u64,
    ) -> Result<AcoustIDResponse, AcoustIDError> {
        let response = retry_transient(
            "acoustid lookup",
            self.retry,
            AcoustIDError::is_transient,
            || self.lookup_once(fingerprint, duration_seconds),
        )
        .await?;

        // Log top match
        if let Some(top_result) = response.results.first() {
            tracing::info!(
                acoustid = %top_result.id,
                score = top_result.score,
                recordings = top_result.recordings.as_ref().map(|r| r.len()).unwrap_or(0),
                "AcoustID lookup successful"
            );
        }

        Ok(response)
    }

    async fn lookup_once(
        &self,
        fingerprint: &str,
        duration_seconds: u64,
    ) -> Result<AcoustIDResponse, AcoustIDError> {
        // Rate limit
        self.rate_limiter.wait().await;

        let duration = duration_seconds.to_string();
        let params = [
            ("client", self.api_key.as_str()),
            ("meta", "recordings"),
            ("duration", duration.as_str()),
            ("fingerprint", fingerprint),
        ];

        tracing::debug!(duration_seconds, "Querying AcoustID API");

        let response = self
            .http_client
            .post(ACOUSTID_BASE_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| AcoustIDError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 {
            return Err(AcoustIDError::InvalidApiKey);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AcoustIDError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(AcoustIDError::ApiError(status.as_u16(), body));
        }

        parse_lookup_response(&body)
    }
}

/// Parse a lookup body, turning `"status": "error"` into an error
pub fn parse_lookup_response(body: &str) -> Result<AcoustIDResponse, AcoustIDError> {
    let parsed: AcoustIDResponse =
        serde_json::from_str(body).map_err(|e| AcoustIDError::ParseError(e.to_string()))?;

    if parsed.status != "ok" {
        let message = parsed
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| format!("status '{}'", parsed.status));
        // AcoustID reports a bad key as error code 4
        if parsed.error.as_ref().and_then(|e| e.code) == Some(4) {
            return Err(AcoustIDError::InvalidApiKey);
        }
        return Err(AcoustIDError::ApiError(200, message));
    }

    Ok(parsed)
}

/// One candidate per (result, recording) pair, in response order
///
/// Each candidate carries the result score and the raw recording plus the
/// AcoustID track id as its payload.
pub fn candidates_from_response(response: &AcoustIDResponse) -> Vec<Candidate> {
    response
        .results
        .iter()
        .flat_map(|result| {
            result
                .recordings
                .iter()
                .flatten()
                .map(move |recording| {
                    let payload = serde_json::json!({
                        "acoustid": result.id,
                        "recording": recording,
                    });
                    Candidate::new(recording.id.clone(), result.score).with_payload(payload)
                })
        })
        .collect()
}

/// Fingerprint + AcoustID lookup as a `CandidateProvider`
pub struct AcoustIdProvider {
    fingerprinter: Fingerprinter,
    client: AcoustIDClient,
}

impl AcoustIdProvider {
    pub fn new(fingerprinter: Fingerprinter, client: AcoustIDClient) -> Self {
        Self {
            fingerprinter,
            client,
        }
    }

    /// Provider with the default `fpcalc` and a client for `api_key`
    pub fn from_api_key(api_key: String) -> Result<Self, AcoustIDError> {
        Ok(Self::new(Fingerprinter::new(), AcoustIDClient::new(api_key)?))
    }
}

#[async_trait::async_trait]
impl CandidateProvider for AcoustIdProvider {
    fn name(&self) -> &'static str {
        "AcoustID"
    }

    async fn lookup(
        &self,
        path: &Path,
        _snapshot: Option<&TagSnapshot>,
    ) -> Result<Vec<Candidate>, IdentifyError> {
        let fingerprint = self
            .fingerprinter
            .fingerprint_file(path)
            .await
            .map_err(fingerprint_failure)?;

        let response = self
            .client
            .lookup(&fingerprint.fingerprint, fingerprint.duration_seconds)
            .await
            .map_err(|e| IdentifyError::Provider(e.to_string()))?;

        Ok(candidates_from_response(&response))
    }
}

/// Only undecodable audio counts against the file; tool trouble is a provider fault
fn fingerprint_failure(err: FingerprintError) -> IdentifyError {
    match err {
        FingerprintError::Undecodable { .. } => IdentifyError::Fingerprint(err),
        FingerprintError::ToolUnavailable(_)
        | FingerprintError::Timeout(_)
        | FingerprintError::InvalidOutput(_) => IdentifyError::Provider(err.to_string()),
    }
}
