//! Trigger context of a CI run
//!
//! Everything the orchestrator knows about the event that started the run,
//! read once from the CI-provided environment and immutable afterwards.

use crate::core::error::PublishError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value of `CI_PIPELINE_SOURCE` that disables the cache-seed pull
const SCHEDULE_SOURCE: &str = "schedule";

/// How the CI platform started the pipeline (`CI_PIPELINE_SOURCE`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineSource {
    Push,
    Schedule,
    Other(String),
}

impl PipelineSource {
    pub fn parse(value: &str) -> Self {
        match value {
            "push" => Self::Push,
            SCHEDULE_SOURCE => Self::Schedule,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Git reference the run was started for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum GitRef {
    Branch(String),
    Tag(String),
}

impl GitRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Branch(name) | Self::Tag(name) => name,
        }
    }
}

/// Trigger class of a run, as seen by the publish paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Push,
    Tag,
    Schedule,
}

/// The event that started a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub pipeline_source: PipelineSource,
    pub git_ref: GitRef,
    pub commit_sha: String,
    pub project_url: String,
}

impl TriggerContext {
    /// Read the trigger context from CI environment variables.
    ///
    /// `CI_COMMIT_TAG` marks a tag run. Otherwise the branch is taken from
    /// `CI_COMMIT_BRANCH`, falling back to `CI_COMMIT_REF_NAME`.
    pub fn from_env(env: &HashMap<String, String>) -> Result<Self, PublishError> {
        let git_ref = if let Some(tag) = non_empty(env, "CI_COMMIT_TAG") {
            GitRef::Tag(tag)
        } else if let Some(branch) = non_empty(env, "CI_COMMIT_BRANCH") {
            GitRef::Branch(branch)
        } else {
            GitRef::Branch(required(env, "CI_COMMIT_REF_NAME")?)
        };

        let pipeline_source = non_empty(env, "CI_PIPELINE_SOURCE")
            .map(|s| PipelineSource::parse(&s))
            .unwrap_or(PipelineSource::Push);

        Ok(Self {
            pipeline_source,
            git_ref,
            commit_sha: required(env, "CI_COMMIT_SHA")?,
            project_url: required(env, "CI_PROJECT_URL")?,
        })
    }

    /// Trigger class of the run.
    ///
    /// Branch pipelines started by anything but a push or a schedule (merge
    /// requests, manual runs, API triggers) have no class and publish nothing.
    pub fn source(&self) -> Option<TriggerSource> {
        match (&self.git_ref, &self.pipeline_source) {
            (GitRef::Tag(_), _) => Some(TriggerSource::Tag),
            (GitRef::Branch(_), PipelineSource::Push) => Some(TriggerSource::Push),
            (GitRef::Branch(_), PipelineSource::Schedule) => Some(TriggerSource::Schedule),
            (GitRef::Branch(_), PipelineSource::Other(_)) => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.pipeline_source == PipelineSource::Schedule
    }

    pub fn branch(&self) -> Option<&str> {
        match &self.git_ref {
            GitRef::Branch(name) => Some(name),
            GitRef::Tag(_) => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.git_ref {
            GitRef::Tag(name) => Some(name),
            GitRef::Branch(_) => None,
        }
    }
}

/// Read a variable, treating an empty value the same as an unset one
pub fn non_empty(env: &HashMap<String, String>, name: &str) -> Option<String> {
    env.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn required(env: &HashMap<String, String>, name: &str) -> Result<String, PublishError> {
    non_empty(env, name).ok_or_else(|| PublishError::MissingEnvironment {
        name: name.to_string(),
    })
}
