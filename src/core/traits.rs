//! Core traits and types shared across the crate
//!
//! This module defines validation result types and the release target
//! abstraction implemented by release distribution sites.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Validation
// ============================================================================

/// Validation error with field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Validation warning with field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

/// Result of a validation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn warning(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Close the pass: valid when no errors were recorded
    pub fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

// ============================================================================
// Releases
// ============================================================================

/// One plugin release, ready to be distributed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    pub changelog: String,
    pub game_versions: Vec<String>,
    pub artifact: PathBuf,
}

/// Result of an upload to a release target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

/// A site plugin releases are distributed to
#[async_trait]
pub trait ReleaseTarget: Send + Sync {
    /// Target name (e.g., "modrinth")
    fn name(&self) -> &str;

    /// Upload the release artifact and its metadata
    async fn upload(&self, release: &Release) -> anyhow::Result<UploadResult>;
}
