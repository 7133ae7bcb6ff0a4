//! Configuration structures and types for plugin-publisher
//!
//! Two kinds of configuration live here: the optional project file
//! (`.plugin-publisher.yaml`) with its serde schema, and the registry targets
//! that are always read from the CI environment.

use crate::core::context::{non_empty, required};
use crate::core::error::PublishError;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Username GitLab accepts together with `CI_JOB_TOKEN`
pub const CI_REGISTRY_USER: &str = "gitlab-ci-token";

/// Registry host used for the Docker Hub mirror
pub const DOCKER_HUB_HOST: &str = "docker.io";

/// Tag pushed on the main-branch path
pub const LATEST_TAG: &str = "latest";

/// Which image the tag-path mirror re-tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorSource {
    /// The image built by this run (`<image>:<tag>`)
    #[default]
    Built,
    /// The primary registry's `:latest`, whatever it currently points to
    Latest,
}

/// Effective publish configuration after all sources are merged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishConfig {
    /// Branches that trigger the main-branch path
    pub main_branches: Vec<String>,

    /// Docker build context directory
    pub dockerfile_context: String,

    /// Image the tag-path mirror re-tags
    pub mirror_source: MirrorSource,

    /// Extra `--build-arg` values, in addition to `VCS_REF`/`VCS_URL`
    pub build_args: BTreeMap<String, String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            main_branches: vec!["main".to_string(), "master".to_string()],
            dockerfile_context: ".".to_string(),
            mirror_source: MirrorSource::Built,
            build_args: BTreeMap::new(),
        }
    }
}

impl PublishConfig {
    pub fn is_main_branch(&self, branch: &str) -> bool {
        self.main_branches.iter().any(|b| b == branch)
    }
}

/// Schema of `.plugin-publisher.yaml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Extend from base configuration file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_branches: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dockerfile_context: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_source: Option<MirrorSource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_args: Option<BTreeMap<String, String>>,
}

/// Login material for one registry
#[derive(Debug, Clone)]
pub struct RegistryCredentials {
    pub host: String,
    pub username: String,
    pub token: SecretString,
}

/// The CI platform's built-in registry
#[derive(Debug, Clone)]
pub struct PrimaryRegistry {
    pub credentials: RegistryCredentials,
    /// Full image name, e.g. `registry.gitlab.com/group/project`
    pub image: String,
}

/// Optional Docker Hub mirror
#[derive(Debug, Clone)]
pub struct MirrorRegistry {
    pub credentials: RegistryCredentials,
    /// Repository name, e.g. `owner/deploy-helper`
    pub repository: String,
}

/// All registries a run may touch
#[derive(Debug, Clone)]
pub struct RegistryTargets {
    pub primary: PrimaryRegistry,
    pub mirror: Option<MirrorRegistry>,
}

impl RegistryTargets {
    /// Read registry targets from CI environment variables.
    ///
    /// An empty or unset `DOCKER_HUB_REPO` disables the mirror. When the
    /// repository is set, `DOCKER_HUB_TOKEN` becomes required. The login user
    /// is `DOCKER_HUB_USER`, or the namespace of the repository.
    pub fn from_env(env: &HashMap<String, String>) -> Result<Self, PublishError> {
        let primary = PrimaryRegistry {
            credentials: RegistryCredentials {
                host: required(env, "CI_REGISTRY")?,
                username: CI_REGISTRY_USER.to_string(),
                token: SecretString::from(required(env, "CI_JOB_TOKEN")?),
            },
            image: required(env, "CI_REGISTRY_IMAGE")?,
        };

        let mirror = match non_empty(env, "DOCKER_HUB_REPO") {
            Some(repository) => {
                let username = non_empty(env, "DOCKER_HUB_USER")
                    .or_else(|| repository.split_once('/').map(|(ns, _)| ns.to_string()))
                    .ok_or_else(|| PublishError::MissingEnvironment {
                        name: "DOCKER_HUB_USER".to_string(),
                    })?;

                Some(MirrorRegistry {
                    credentials: RegistryCredentials {
                        host: DOCKER_HUB_HOST.to_string(),
                        username,
                        token: SecretString::from(required(env, "DOCKER_HUB_TOKEN")?),
                    },
                    repository,
                })
            }
            None => None,
        };

        Ok(Self { primary, mirror })
    }
}
