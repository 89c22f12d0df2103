//! Policy objects
//!
//! Immutable, validated configuration for the three decision points of the
//! pipeline. Invalid values are rejected at construction, never at call time,
//! so a `Policies` value that exists is always usable.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default inclusive confidence threshold for a "confident match"
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.90;

/// Default number of candidates kept from the provider
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Default rename template
pub const DEFAULT_TEMPLATE: &str = "{title}_{artist}";

/// How identification results are gated
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IdentificationPolicy {
    min_confidence: f64,
    max_candidates: usize,
}

impl IdentificationPolicy {
    /// Create a validated policy
    ///
    /// # Errors
    /// `min_confidence` outside (0, 1] or `max_candidates` of zero.
    pub fn new(min_confidence: f64, max_candidates: usize) -> Result<Self, ConfigurationError> {
        // NaN fails both comparisons, so test for the valid range rather than the invalid one
        if !(min_confidence > 0.0 && min_confidence <= 1.0) {
            return Err(ConfigurationError::MinConfidenceOutOfRange(min_confidence));
        }
        if max_candidates < 1 {
            return Err(ConfigurationError::MaxCandidatesTooSmall(max_candidates));
        }
        Ok(Self {
            min_confidence,
            max_candidates,
        })
    }

    /// Inclusive lower bound for a confident match
    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// True when `confidence` clears the threshold (inclusive)
    pub fn is_confident(&self, confidence: f64) -> bool {
        confidence >= self.min_confidence
    }
}

impl Default for IdentificationPolicy {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// What to do with tags when identification does not produce a confident match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    /// Rewrite the existing readable tags through the normalising write path
    #[default]
    Passthrough,
    /// Leave the file's tags alone
    Skip,
}

impl FailMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailMode::Passthrough => "passthrough",
            FailMode::Skip => "skip",
        }
    }
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passthrough" => Ok(FailMode::Passthrough),
            "skip" => Ok(FailMode::Skip),
            other => Err(ConfigurationError::UnknownFailMode(other.to_string())),
        }
    }
}

/// Tag-writing behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagPolicy {
    /// Normalise fields VirtualDJ is known to misread before every write
    pub ensure_virtualdj_compat: bool,
    /// Behaviour when no confident match is available
    pub on_identify_fail: FailMode,
}

impl TagPolicy {
    pub fn new(ensure_virtualdj_compat: bool, on_identify_fail: FailMode) -> Self {
        Self {
            ensure_virtualdj_compat,
            on_identify_fail,
        }
    }

    /// VirtualDJ-safe preset: compat transforms on, passthrough rewrite on miss
    pub fn virtualdj_safe() -> Self {
        Self::new(true, FailMode::Passthrough)
    }

    /// Never touch tags unless a confident match was found
    pub fn skip_on_fail() -> Self {
        Self::new(true, FailMode::Skip)
    }
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self::virtualdj_safe()
    }
}

/// File renaming behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePolicy {
    enabled: bool,
    template: String,
    require_title_and_artist: bool,
}

impl RenamePolicy {
    /// Create a validated policy
    ///
    /// # Errors
    /// An enabled policy with a blank template.
    pub fn new(
        enabled: bool,
        template: impl Into<String>,
        require_title_and_artist: bool,
    ) -> Result<Self, ConfigurationError> {
        let template = template.into();
        if enabled && template.trim().is_empty() {
            return Err(ConfigurationError::EmptyTemplate);
        }
        Ok(Self {
            enabled,
            template,
            require_title_and_artist,
        })
    }

    /// Renaming switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            template: DEFAULT_TEMPLATE.to_string(),
            require_title_and_artist: true,
        }
    }

    /// Template preset: rename enabled with `template`, title and artist required
    pub fn template(template: impl Into<String>) -> Result<Self, ConfigurationError> {
        Self::new(true, template, true)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn template_str(&self) -> &str {
        &self.template
    }

    pub fn require_title_and_artist(&self) -> bool {
        self.require_title_and_artist
    }

    /// Whether a rename may be attempted given which fields are present
    pub fn allows(&self, has_title: bool, has_artist: bool) -> bool {
        self.enabled && (!self.require_title_and_artist || (has_title && has_artist))
    }
}

impl Default for RenamePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            template: DEFAULT_TEMPLATE.to_string(),
            require_title_and_artist: true,
        }
    }
}

/// The three policies, passed together to the pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policies {
    pub identification: IdentificationPolicy,
    pub tag: TagPolicy,
    pub rename: RenamePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identification_policy_bounds() {
        assert!(IdentificationPolicy::new(1.0, 1).is_ok());
        assert!(IdentificationPolicy::new(0.0001, 10).is_ok());

        assert_eq!(
            IdentificationPolicy::new(0.0, 5),
            Err(ConfigurationError::MinConfidenceOutOfRange(0.0))
        );
        assert!(matches!(
            IdentificationPolicy::new(1.01, 5),
            Err(ConfigurationError::MinConfidenceOutOfRange(_))
        ));
        assert!(matches!(
            IdentificationPolicy::new(-0.5, 5),
            Err(ConfigurationError::MinConfidenceOutOfRange(_))
        ));
        assert!(matches!(
            IdentificationPolicy::new(f64::NAN, 5),
            Err(ConfigurationError::MinConfidenceOutOfRange(_))
        ));
        assert_eq!(
            IdentificationPolicy::new(0.9, 0),
            Err(ConfigurationError::MaxCandidatesTooSmall(0))
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = IdentificationPolicy::new(0.9, 5).unwrap();
        assert!(policy.is_confident(0.9));
        assert!(policy.is_confident(0.95));
        assert!(!policy.is_confident(0.8999));
    }

    #[test]
    fn test_defaults() {
        let policy = IdentificationPolicy::default();
        assert_eq!(policy.min_confidence(), DEFAULT_MIN_CONFIDENCE);
        assert_eq!(policy.max_candidates(), DEFAULT_MAX_CANDIDATES);

        let tag = TagPolicy::default();
        assert!(tag.ensure_virtualdj_compat);
        assert_eq!(tag.on_identify_fail, FailMode::Passthrough);

        let rename = RenamePolicy::default();
        assert!(rename.enabled());
        assert_eq!(rename.template_str(), "{title}_{artist}");
        assert!(rename.require_title_and_artist());
    }

    #[test]
    fn test_presets_expose_fields() {
        let safe = TagPolicy::virtualdj_safe();
        assert_eq!(safe, TagPolicy::new(true, FailMode::Passthrough));

        let tpl = RenamePolicy::template("{artist} - {title}").unwrap();
        assert!(tpl.enabled());
        assert_eq!(tpl.template_str(), "{artist} - {title}");

        assert!(!RenamePolicy::disabled().enabled());
    }

    #[test]
    fn test_rename_policy_rejects_blank_template() {
        assert_eq!(
            RenamePolicy::template("   "),
            Err(ConfigurationError::EmptyTemplate)
        );
        // A disabled policy never renders its template
        assert!(RenamePolicy::new(false, "", true).is_ok());
    }

    #[test]
    fn test_rename_allows() {
        let strict = RenamePolicy::default();
        assert!(strict.allows(true, true));
        assert!(!strict.allows(true, false));

        let relaxed = RenamePolicy::new(true, "{title}", false).unwrap();
        assert!(relaxed.allows(false, false));

        assert!(!RenamePolicy::disabled().allows(true, true));
    }

    #[test]
    fn test_fail_mode_parse() {
        assert_eq!("passthrough".parse::<FailMode>().unwrap(), FailMode::Passthrough);
        assert_eq!(" SKIP ".parse::<FailMode>().unwrap(), FailMode::Skip);
        assert!(matches!(
            "ignore".parse::<FailMode>(),
            Err(ConfigurationError::UnknownFailMode(_))
        ));
    }
}
