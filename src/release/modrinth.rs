//! Modrinth release target
//!
//! Creates a new project version through `POST /v2/version`: a multipart
//! request with the version metadata as JSON in the `data` part and the
//! plugin jar in the `file` part.

use crate::core::traits::{Release, ReleaseTarget, UploadResult};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const MODRINTH_API: &str = "https://api.modrinth.com/v2";

/// Loaders every plugin release runs on
const LOADERS: &[&str] = &["bukkit", "paper", "spigot"];

/// Multipart part carrying the jar
const FILE_PART: &str = "file";

/// Version metadata sent in the `data` part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionData {
    pub name: String,
    pub version_number: String,
    pub changelog: String,
    pub dependencies: Vec<serde_json::Value>,
    pub game_versions: Vec<String>,
    pub version_type: String,
    pub loaders: Vec<String>,
    pub featured: bool,
    pub status: String,
    pub requested_status: String,
    pub project_id: String,
    pub file_parts: Vec<String>,
    pub primary_file: String,
}

impl VersionData {
    pub fn for_release(release: &Release, project_id: &str) -> Self {
        Self {
            name: release.version.clone(),
            version_number: release.version.clone(),
            changelog: release.changelog.clone(),
            dependencies: Vec::new(),
            game_versions: release.game_versions.clone(),
            version_type: "release".to_string(),
            loaders: LOADERS.iter().map(|l| l.to_string()).collect(),
            featured: true,
            status: "listed".to_string(),
            requested_status: "listed".to_string(),
            project_id: project_id.to_string(),
            file_parts: vec![FILE_PART.to_string()],
            primary_file: FILE_PART.to_string(),
        }
    }
}

/// Uploads releases to one Modrinth project
pub struct ModrinthTarget {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: SecretString,
}

impl ModrinthTarget {
    pub fn new(project_id: impl Into<String>, auth: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: MODRINTH_API.to_string(),
            project_id: project_id.into(),
            auth,
        }
    }

    /// Point the target at another API root (staging)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ReleaseTarget for ModrinthTarget {
    fn name(&self) -> &str {
        "modrinth"
    }

    async fn upload(&self, release: &Release) -> anyhow::Result<UploadResult> {
        let data = VersionData::for_release(release, &self.project_id);
        let bytes = tokio::fs::read(&release.artifact)
            .await
            .with_context(|| format!("Failed to read {}", release.artifact.display()))?;
        let file_name = release
            .artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plugin.jar".to_string());

        tracing::info!(
            artifact = %file_name,
            version = %release.version,
            project_id = %self.project_id,
            "Uploading artifact to Modrinth"
        );

        let form = Form::new()
            .text("data", serde_json::to_string(&data)?)
            .part(
                FILE_PART,
                Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("application/java-archive")?,
            );

        let response = self
            .client
            .post(format!("{}/version", self.base_url.trim_end_matches('/')))
            .header(reqwest::header::AUTHORIZATION, self.auth.expose_secret())
            .multipart(form)
            .send()
            .await
            .context("Modrinth request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Modrinth responded with {}: {}", status, body);
        }

        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        let url = body
            .get("project_id")
            .and_then(|v| v.as_str())
            .zip(body.get("id").and_then(|v| v.as_str()))
            .map(|(project, version)| {
                format!("https://modrinth.com/plugin/{}/version/{}", project, version)
            });

        Ok(UploadResult {
            success: true,
            target: self.name().to_string(),
            url,
            response: Some(body),
        })
    }
}
