//! Image Publisher - executes a publish plan against the registries
//!
//! Steps run strictly in order, each at most once. A tolerated step that
//! fails is logged and skipped; any other failure aborts the run and the
//! error is returned with the failing command's exit status and stderr.

use crate::core::config::RegistryTargets;
use crate::core::error::PublishError;
use crate::orchestration::plan::{PublishPath, PublishPlan, PublishStep, RegistryRole};
use crate::security::{CommandRunner, SecureTokenManager};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const DOCKER: &str = "docker";

/// Outcome of a completed publish run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReport {
    pub run_id: Uuid,
    pub path: Option<PublishPath>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Command lines of the steps that succeeded
    pub completed_steps: Vec<String>,
    /// Command lines of tolerated steps that failed
    pub tolerated_failures: Vec<String>,
    /// Image references pushed during the run
    pub pushed: Vec<String>,
}

/// Runs publish plans through a [`CommandRunner`]
pub struct ImagePublisher {
    runner: Arc<dyn CommandRunner>,
    targets: RegistryTargets,
    tokens: SecureTokenManager,
}

impl ImagePublisher {
    /// Create a publisher
    ///
    /// # Arguments
    ///
    /// * `runner` - Executes docker commands
    /// * `targets` - Registries and the credentials used for login steps
    /// * `tokens` - Used to scrub secrets from error messages
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        targets: RegistryTargets,
        tokens: SecureTokenManager,
    ) -> Self {
        Self {
            runner,
            targets,
            tokens,
        }
    }

    /// Execute every step of `plan` in order
    pub async fn run(&self, plan: &PublishPlan) -> Result<PublishReport, PublishError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = Uuid::new_v4();

        let mut report = PublishReport {
            run_id,
            path: plan.path,
            started_at,
            duration_ms: 0,
            completed_steps: Vec::new(),
            tolerated_failures: Vec::new(),
            pushed: Vec::new(),
        };

        if plan.is_empty() {
            tracing::info!(%run_id, "No publish path selected for this trigger");
            return Ok(report);
        }

        tracing::info!(%run_id, path = ?plan.path, steps = plan.steps.len(), "Starting publish run");

        for step in &plan.steps {
            let line = step.command_line();
            tracing::info!(step = step.name(), command = %line, "Running step");

            match self.execute(step).await {
                Ok(()) => {
                    report.completed_steps.push(line);
                    match step {
                        PublishStep::Build { tags, .. } => report.pushed.extend(tags.clone()),
                        PublishStep::Push { image, .. } => report.pushed.push(image.clone()),
                        _ => {}
                    }
                }
                Err(error) if step.is_tolerated() => {
                    tracing::warn!(step = step.name(), error = %error, "Tolerated step failed, continuing");
                    report.tolerated_failures.push(line);
                }
                Err(error) => {
                    tracing::error!(
                        step = step.name(),
                        code = error.code(),
                        completed = report.completed_steps.len(),
                        "Publish run aborted"
                    );
                    return Err(error);
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            %run_id,
            pushed = ?report.pushed,
            duration_ms = report.duration_ms,
            "Publish run finished"
        );

        Ok(report)
    }

    async fn execute(&self, step: &PublishStep) -> Result<(), PublishError> {
        let registry = self.registry_host(step.role()).to_string();
        let stdin = match step {
            PublishStep::Login { role, .. } => Some(self.login_token(*role)),
            _ => None,
        };

        let output = self
            .runner
            .run(DOCKER, &step.docker_args(), stdin)
            .await
            .map_err(|e| PublishError::CommandError {
                registry: registry.clone(),
                message: e.to_string(),
            })?;

        if output.success() {
            return Ok(());
        }

        let message = self.tokens.mask_tokens_in_string(&output.failure_message());
        Err(match step {
            PublishStep::Login { .. } => PublishError::AuthenticationFailed { registry, message },
            PublishStep::Build { .. } => PublishError::BuildFailed { registry, message },
            PublishStep::CachePull { image } | PublishStep::Pull { image } => {
                PublishError::PullFailed {
                    registry,
                    image: image.clone(),
                    message,
                }
            }
            PublishStep::Tag { source, target } => PublishError::TagFailed {
                registry,
                source_image: source.clone(),
                target: target.clone(),
                message,
            },
            PublishStep::Push { image, .. } => PublishError::PushFailed {
                registry,
                image: image.clone(),
                message,
            },
        })
    }

    fn login_token(&self, role: RegistryRole) -> &SecretString {
        match (role, &self.targets.mirror) {
            (RegistryRole::Mirror, Some(mirror)) => &mirror.credentials.token,
            _ => &self.targets.primary.credentials.token,
        }
    }

    fn registry_host(&self, role: RegistryRole) -> &str {
        match (role, &self.targets.mirror) {
            (RegistryRole::Mirror, Some(mirror)) => &mirror.credentials.host,
            _ => &self.targets.primary.credentials.host,
        }
    }
}
