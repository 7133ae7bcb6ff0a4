//! Release preparation and distribution for a plugin project
//!
//! Run from a plugin project's tag pipeline: collects the packaged jar, the
//! supported game versions and the changelog entry, writes the release notes
//! file, then hands the release to every configured target.

use crate::core::context::{non_empty, required};
use crate::core::error::PublishError;
use crate::core::traits::{Release, ReleaseTarget, UploadResult};
use crate::descriptor::ChildDescriptor;
use crate::release::changelog;
use crate::release::game_versions::{self, DEFAULT_MINIMUM_VERSION};
use crate::release::modrinth::ModrinthTarget;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Prefix the shade step gives the unshaded jar it leaves behind
const UNSHADED_PREFIX: &str = "original-";

/// Environment of a plugin project's release job
#[derive(Debug, Clone)]
pub struct ReleaseEnvironment {
    pub project_dir: PathBuf,
    pub version: String,
    pub modrinth_project_id: Option<String>,
    pub modrinth_auth: Option<SecretString>,
}

impl ReleaseEnvironment {
    pub fn from_env(env: &HashMap<String, String>) -> Result<Self, PublishError> {
        Ok(Self {
            project_dir: PathBuf::from(required(env, "CI_PROJECT_DIR")?),
            version: required(env, "CI_COMMIT_TAG")?,
            modrinth_project_id: non_empty(env, "MODRINTH_PROJECT_ID"),
            modrinth_auth: non_empty(env, "MODRINTH_AUTH").map(SecretString::from),
        })
    }

    /// Release targets enabled by this environment.
    ///
    /// Modrinth is enabled by `MODRINTH_PROJECT_ID`; its token then becomes
    /// required.
    pub fn targets(&self) -> Result<Vec<Box<dyn ReleaseTarget>>, PublishError> {
        let mut targets: Vec<Box<dyn ReleaseTarget>> = Vec::new();

        if let Some(project_id) = &self.modrinth_project_id {
            let auth = self
                .modrinth_auth
                .clone()
                .ok_or_else(|| PublishError::MissingEnvironment {
                    name: "MODRINTH_AUTH".to_string(),
                })?;
            targets.push(Box::new(ModrinthTarget::new(project_id.clone(), auth)));
        }

        Ok(targets)
    }
}

/// Builds and distributes one release
pub struct ReleaseUploader {
    project_dir: PathBuf,
}

impl ReleaseUploader {
    pub fn new<P: AsRef<Path>>(project_dir: P) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Collect everything a release needs from the project directory
    pub async fn prepare(&self, version: &str) -> Result<Release, PublishError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(PublishError::InvalidVersion(version.to_string()));
        }

        let artifact = self.find_artifact()?;
        let game_versions = self.game_versions().await?;
        let changelog = changelog::read_entry(&self.project_dir, version).await?;

        if let (Some(first), Some(last)) = (game_versions.first(), game_versions.last()) {
            tracing::info!("Plugin supports Minecraft {} - {}", first, last);
        }

        Ok(Release {
            version: version.to_string(),
            changelog,
            game_versions,
            artifact,
        })
    }

    /// Write the release notes file for later pipeline jobs
    pub async fn save_changelog(&self, release: &Release) -> Result<PathBuf, PublishError> {
        changelog::save_release_notes(&self.project_dir, &release.changelog).await
    }

    /// Upload to every target in order; the first failure stops the run
    pub async fn publish(
        &self,
        release: &Release,
        targets: &[Box<dyn ReleaseTarget>],
    ) -> Result<Vec<UploadResult>, PublishError> {
        let mut results = Vec::with_capacity(targets.len());

        for target in targets {
            let result = target
                .upload(release)
                .await
                .map_err(|e| PublishError::UploadFailed {
                    registry: target.name().to_string(),
                    message: format!("{:#}", e),
                })?;
            tracing::info!(target = target.name(), url = ?result.url, "Release uploaded");
            results.push(result);
        }

        Ok(results)
    }

    /// The shaded jar under `target/`
    fn find_artifact(&self) -> Result<PathBuf, PublishError> {
        let target_dir = self.project_dir.join("target");

        let mut jars: Vec<PathBuf> = WalkDir::new(&target_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("jar")
            })
            .collect();

        // Prefer the shaded jar over the unshaded backup
        jars.sort_by_key(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(UNSHADED_PREFIX))
        });

        jars.into_iter()
            .next()
            .ok_or_else(|| PublishError::ArtifactNotFound(target_dir.display().to_string()))
    }

    async fn game_versions(&self) -> Result<Vec<String>, PublishError> {
        let pom = self.project_dir.join("pom.xml");
        let declared = if pom.exists() {
            ChildDescriptor::read(&pom).await?.api_version
        } else {
            None
        };

        let minimum = match declared {
            Some(version) => version,
            None => {
                tracing::info!(
                    "bukkit-api-version not defined in pom.xml, defaulting to {}",
                    DEFAULT_MINIMUM_VERSION
                );
                DEFAULT_MINIMUM_VERSION.to_string()
            }
        };

        game_versions::supported_versions(&minimum)
    }
}
