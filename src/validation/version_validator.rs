//! Version Validator - validates plugin release versions
//!
//! Plugin projects version themselves the Maven way (`1.4`, `1.4.2`,
//! `1.5.0-SNAPSHOT`) and tag releases with the bare version. Versions are
//! normalized to Semantic Versioning 2.0.0 before they are checked, so
//! missing minor/patch components are filled with zero.
//!
//! # Example
//!
//! ```
//! use plugin_publisher::validation::version_validator::VersionValidator;
//!
//! let validator = VersionValidator::new();
//! let result = validator.validate("1.4");
//!
//! assert!(result.is_valid);
//! assert_eq!(result.normalized.as_deref(), Some("1.4.0"));
//! ```

use semver::Version;
use serde::{Deserialize, Serialize};

/// Maven qualifier marking an unreleased version
const SNAPSHOT_QUALIFIER: &str = "SNAPSHOT";

/// Result of version validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionValidationResult {
    /// Whether the version is valid after normalization
    pub is_valid: bool,
    /// Validation error message (if any)
    pub error: Option<String>,
    /// Semver form of the version
    pub normalized: Option<String>,
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    /// Pre-release part (e.g., "SNAPSHOT", "beta.1")
    pub prerelease: Option<String>,
    /// Whether this is a Maven snapshot
    pub snapshot: bool,
}

/// Validator for plugin release versions
pub struct VersionValidator;

impl Default for VersionValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionValidator {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a release version to semver.
    ///
    /// A leading `v` is dropped and missing minor/patch components are
    /// filled with zero: `v1.4-SNAPSHOT` becomes `1.4.0-SNAPSHOT`.
    pub fn normalize(&self, version_str: &str) -> Option<Version> {
        let trimmed = version_str.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let (core, rest) = match trimmed.find(['-', '+']) {
            Some(idx) => trimmed.split_at(idx),
            None => (trimmed, ""),
        };

        let mut parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return None;
        }
        while parts.len() < 3 {
            parts.push("0");
        }

        Version::parse(&format!("{}{}", parts.join("."), rest)).ok()
    }

    /// Validate a version string
    ///
    /// # Examples
    ///
    /// ```
    /// use plugin_publisher::validation::version_validator::VersionValidator;
    ///
    /// let validator = VersionValidator::new();
    /// assert!(validator.validate("1.2.3").is_valid);
    /// assert!(!validator.validate("invalid").is_valid);
    /// ```
    pub fn validate(&self, version_str: &str) -> VersionValidationResult {
        match self.normalize(version_str) {
            Some(version) => VersionValidationResult {
                is_valid: true,
                error: None,
                normalized: Some(version.to_string()),
                major: Some(version.major),
                minor: Some(version.minor),
                patch: Some(version.patch),
                prerelease: if version.pre.is_empty() {
                    None
                } else {
                    Some(version.pre.to_string())
                },
                snapshot: Self::pre_is_snapshot(&version),
            },
            None => VersionValidationResult {
                is_valid: false,
                error: Some(format!("'{}' is not a release version", version_str)),
                normalized: None,
                major: None,
                minor: None,
                patch: None,
                prerelease: None,
                snapshot: false,
            },
        }
    }

    /// Check if version is a Maven snapshot
    ///
    /// ```
    /// use plugin_publisher::validation::version_validator::VersionValidator;
    ///
    /// let validator = VersionValidator::new();
    /// assert!(validator.is_snapshot("1.5.0-SNAPSHOT"));
    /// assert!(!validator.is_snapshot("1.5.0"));
    /// ```
    pub fn is_snapshot(&self, version_str: &str) -> bool {
        self.normalize(version_str)
            .map(|v| Self::pre_is_snapshot(&v))
            .unwrap_or(false)
    }

    /// Render a release tag name from a Maven tag format
    /// (`@{project.version}` is the only placeholder)
    pub fn tag_name(&self, format: &str, version: &str) -> String {
        format.replace("@{project.version}", version)
    }

    fn pre_is_snapshot(version: &Version) -> bool {
        version
            .pre
            .as_str()
            .rsplit(['.', '-'])
            .next()
            .is_some_and(|last| last == SNAPSHOT_QUALIFIER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_full_version() {
        let validator = VersionValidator::new();
        let result = validator.validate("1.2.3");

        assert!(result.is_valid);
        assert_eq!(result.major, Some(1));
        assert_eq!(result.minor, Some(2));
        assert_eq!(result.patch, Some(3));
        assert!(result.prerelease.is_none());
        assert!(!result.snapshot);
    }

    #[test]
    fn test_validate_short_version() {
        let validator = VersionValidator::new();
        let result = validator.validate("2.1");

        assert!(result.is_valid);
        assert_eq!(result.normalized, Some("2.1.0".to_string()));
    }

    #[test]
    fn test_validate_snapshot() {
        let validator = VersionValidator::new();
        let result = validator.validate("1.5-SNAPSHOT");

        assert!(result.is_valid);
        assert!(result.snapshot);
        assert_eq!(result.prerelease, Some("SNAPSHOT".to_string()));
        assert_eq!(result.normalized, Some("1.5.0-SNAPSHOT".to_string()));
    }

    #[test]
    fn test_host_api_version_is_snapshot() {
        let validator = VersionValidator::new();
        assert!(validator.is_snapshot("1.19.4-R0.1-SNAPSHOT"));
    }

    #[test]
    fn test_leading_v_is_accepted() {
        let validator = VersionValidator::new();
        assert_eq!(
            validator.validate("v3.0.1").normalized,
            Some("3.0.1".to_string())
        );
    }

    #[test]
    fn test_validate_invalid_version() {
        let validator = VersionValidator::new();

        for input in ["invalid", "1.2.3.4", "", "1..2"] {
            let result = validator.validate(input);
            assert!(!result.is_valid, "{} should be rejected", input);
            assert!(result.error.is_some());
        }
    }

    #[test]
    fn test_tag_name() {
        let validator = VersionValidator::new();
        assert_eq!(validator.tag_name("@{project.version}", "1.4.0"), "1.4.0");
        assert_eq!(validator.tag_name("v@{project.version}", "1.4.0"), "v1.4.0");
    }
}
