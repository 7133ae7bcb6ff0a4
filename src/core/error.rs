//! Error handling for image publishing and plugin releases
//!
//! This module provides the error taxonomy of a publish run with recovery
//! guidance, using the thiserror crate for ergonomic error handling.

use thiserror::Error;

/// Main error type for publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("Required environment variable {name} is not set")]
    MissingEnvironment { name: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("'{0}' is not a valid image tag")]
    InvalidImageTag(String),

    // Registry errors
    #[error("[{registry}] login failed: {message}")]
    AuthenticationFailed { registry: String, message: String },

    #[error("[{registry}] image build failed: {message}")]
    BuildFailed { registry: String, message: String },

    #[error("[{registry}] pull of {image} failed: {message}")]
    PullFailed {
        registry: String,
        image: String,
        message: String,
    },

    #[error("[{registry}] tagging {source_image} as {target} failed: {message}")]
    TagFailed {
        registry: String,
        source_image: String,
        target: String,
        message: String,
    },

    #[error("[{registry}] push of {image} failed: {message}")]
    PushFailed {
        registry: String,
        image: String,
        message: String,
    },

    // Command execution errors
    #[error("[{registry}] command error: {message}")]
    CommandError { registry: String, message: String },

    // Build descriptor errors
    #[error("Build descriptor is invalid: {0}")]
    DescriptorInvalid(String),

    // Release errors
    #[error("Invalid release version: {0}")]
    InvalidVersion(String),

    #[error("Unknown game version: {0}")]
    UnknownGameVersion(String),

    #[error("No release artifact found in {0}")]
    ArtifactNotFound(String),

    #[error("[{registry}] upload failed: {message}")]
    UploadFailed { registry: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    /// Registry associated with this error, if any
    pub fn registry(&self) -> Option<&str> {
        match self {
            Self::AuthenticationFailed { registry, .. }
            | Self::BuildFailed { registry, .. }
            | Self::PullFailed { registry, .. }
            | Self::TagFailed { registry, .. }
            | Self::PushFailed { registry, .. }
            | Self::CommandError { registry, .. }
            | Self::UploadFailed { registry, .. } => Some(registry),
            _ => None,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::MissingEnvironment { .. } => vec![
                "Run inside a CI job or export the variable locally",
                "Check the CI/CD variables of the project",
            ],
            Self::ConfigError(_) => vec!["Check .plugin-publisher.yaml for syntax errors"],
            Self::InvalidImageTag(_) => vec![
                "Use tag names made of letters, digits, '_', '.' and '-'",
                "Tag names must not start with '.' or '-'",
            ],
            Self::AuthenticationFailed { .. } => vec![
                "Check that the registry token is valid and not expired",
                "Check that the token has write access to the repository",
            ],
            Self::BuildFailed { .. } => vec![
                "Check the Dockerfile and build context",
                "Run the same build locally with docker buildx",
            ],
            Self::PullFailed { .. } => vec!["Check that the source image exists"],
            Self::TagFailed { .. } => vec!["Check that the source image was pulled"],
            Self::PushFailed { .. } => vec![
                "Check registry connectivity",
                "Check the repository name and push permissions",
            ],
            Self::CommandError { .. } => vec![
                "Check the command output",
                "Check that docker is installed and on PATH",
            ],
            Self::DescriptorInvalid(_) => {
                vec!["Fix the reported field of the build descriptor"]
            }
            Self::InvalidVersion(_) => vec!["Tag releases with a version like 1.2.3"],
            Self::UnknownGameVersion(_) => {
                vec!["Set bukkit-api-version in pom.xml to a supported version"]
            }
            Self::ArtifactNotFound(_) => vec!["Run the package phase before releasing"],
            Self::UploadFailed { .. } => vec![
                "Check MODRINTH_AUTH and MODRINTH_PROJECT_ID",
                "Check that the version does not already exist",
            ],
            Self::Io(_) => vec!["Check file permissions"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingEnvironment { .. } => "MISSING_ENVIRONMENT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidImageTag(_) => "INVALID_IMAGE_TAG",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::BuildFailed { .. } => "BUILD_FAILED",
            Self::PullFailed { .. } => "PULL_FAILED",
            Self::TagFailed { .. } => "TAG_FAILED",
            Self::PushFailed { .. } => "PUSH_FAILED",
            Self::CommandError { .. } => "COMMAND_ERROR",
            Self::DescriptorInvalid(_) => "DESCRIPTOR_INVALID",
            Self::InvalidVersion(_) => "INVALID_VERSION",
            Self::UnknownGameVersion(_) => "UNKNOWN_GAME_VERSION",
            Self::ArtifactNotFound(_) => "ARTIFACT_NOT_FOUND",
            Self::UploadFailed { .. } => "UPLOAD_FAILED",
            Self::Io(_) => "IO_ERROR",
        }
    }
}
