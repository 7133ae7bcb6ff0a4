//! Publish planning
//!
//! Turns a trigger context and the configuration into the ordered list of
//! registry steps one run executes. Planning is pure: no process is started
//! and no network is touched, so a plan can be printed for a dry run and
//! asserted on in tests.

use crate::core::config::{LATEST_TAG, MirrorSource, PublishConfig, RegistryTargets};
use crate::core::context::{TriggerContext, TriggerSource};
use crate::core::error::PublishError;
use crate::security::SecureTokenManager;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

lazy_static! {
    /// Docker reference tag grammar
    static ref IMAGE_TAG: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").unwrap();
}

/// The two mutually exclusive publish paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPath {
    MainBranch,
    Tag,
}

/// Which registry a step talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryRole {
    Primary,
    Mirror,
}

/// One docker invocation of a publish run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PublishStep {
    Login {
        role: RegistryRole,
        host: String,
        username: String,
    },
    /// Best-effort pull of the previous image to seed the layer cache
    CachePull { image: String },
    /// Build and push every tag in one invocation
    Build {
        context: String,
        tags: Vec<String>,
        cache_from: Option<String>,
        build_args: BTreeMap<String, String>,
    },
    Pull { image: String },
    Tag { source: String, target: String },
    Push { role: RegistryRole, image: String },
}

impl PublishStep {
    /// Tolerated steps may fail without aborting the run
    pub fn is_tolerated(&self) -> bool {
        matches!(self, Self::CachePull { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::CachePull { .. } => "cache-pull",
            Self::Build { .. } => "build",
            Self::Pull { .. } => "pull",
            Self::Tag { .. } => "tag",
            Self::Push { .. } => "push",
        }
    }

    pub fn role(&self) -> RegistryRole {
        match self {
            Self::Login { role, .. } | Self::Push { role, .. } => *role,
            Self::Tag { .. } => RegistryRole::Mirror,
            Self::CachePull { .. } | Self::Build { .. } | Self::Pull { .. } => {
                RegistryRole::Primary
            }
        }
    }

    /// Arguments passed to `docker` for this step.
    ///
    /// Login reads its password from stdin, so no secret ever appears here.
    pub fn docker_args(&self) -> Vec<String> {
        match self {
            Self::Login { host, username, .. } => vec![
                "login".to_string(),
                "--username".to_string(),
                username.clone(),
                "--password-stdin".to_string(),
                host.clone(),
            ],
            Self::CachePull { image } | Self::Pull { image } => {
                vec!["pull".to_string(), image.clone()]
            }
            Self::Build {
                context,
                tags,
                cache_from,
                build_args,
            } => {
                let mut args = vec![
                    "buildx".to_string(),
                    "build".to_string(),
                    "--pull".to_string(),
                    "--push".to_string(),
                ];
                for (key, value) in build_args {
                    args.push("--build-arg".to_string());
                    args.push(format!("{}={}", key, value));
                }
                if let Some(cache) = cache_from {
                    args.push("--cache-from".to_string());
                    args.push(cache.clone());
                }
                for tag in tags {
                    args.push("--tag".to_string());
                    args.push(tag.clone());
                }
                args.push(context.clone());
                args
            }
            Self::Tag { source, target } => {
                vec!["tag".to_string(), source.clone(), target.clone()]
            }
            Self::Push { image, .. } => vec!["push".to_string(), image.clone()],
        }
    }

    /// Shell-like rendering for logs and dry runs
    pub fn command_line(&self) -> String {
        format!("docker {}", self.docker_args().join(" "))
    }
}

/// Ordered steps of one run; empty when the trigger selects no path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPlan {
    pub path: Option<PublishPath>,
    pub steps: Vec<PublishStep>,
}

impl PublishPlan {
    /// Plan of a run that selects no publish path
    pub fn empty() -> Self {
        Self {
            path: None,
            steps: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Command lines printed for a dry run, with known tokens masked
    pub fn dry_run_lines(&self, tokens: &SecureTokenManager) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| {
                let line = tokens.mask_tokens_in_string(&step.command_line());
                if step.is_tolerated() {
                    format!("{} (tolerated)", line)
                } else {
                    line
                }
            })
            .collect()
    }

    /// Image references pushed when every step succeeds
    pub fn pushed_images(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(|step| match step {
                PublishStep::Build { tags, .. } => tags.clone(),
                PublishStep::Push { image, .. } => vec![image.clone()],
                _ => Vec::new(),
            })
            .collect()
    }
}

/// Builds publish plans
pub struct PublishPlanner<'a> {
    config: &'a PublishConfig,
    targets: &'a RegistryTargets,
}

impl<'a> PublishPlanner<'a> {
    pub fn new(config: &'a PublishConfig, targets: &'a RegistryTargets) -> Self {
        Self { config, targets }
    }

    /// Select the publish path for `context` and lay out its steps
    pub fn plan(&self, context: &TriggerContext) -> Result<PublishPlan, PublishError> {
        let source = match context.source() {
            Some(source) => source,
            None => {
                tracing::info!(
                    source = ?context.pipeline_source,
                    "Pipeline source does not publish, nothing to do"
                );
                return Ok(PublishPlan::empty());
            }
        };

        if let (TriggerSource::Tag, Some(tag)) = (source, context.tag()) {
            return self.tag_plan(context, tag);
        }

        match context.branch() {
            Some(branch) if self.config.is_main_branch(branch) => self.main_branch_plan(context),
            Some(branch) => {
                tracing::info!(branch = %branch, "Branch is not a publish branch, nothing to do");
                Ok(PublishPlan::empty())
            }
            None => Ok(PublishPlan::empty()),
        }
    }

    fn main_branch_plan(&self, context: &TriggerContext) -> Result<PublishPlan, PublishError> {
        let latest = self.primary_ref(LATEST_TAG);
        let mut steps = self.login_steps();

        let cache_from = if context.is_scheduled() {
            tracing::info!("Scheduled run, skipping cache-seed pull");
            None
        } else {
            steps.push(PublishStep::CachePull {
                image: latest.clone(),
            });
            Some(latest.clone())
        };

        steps.push(PublishStep::Build {
            context: self.config.dockerfile_context.clone(),
            tags: vec![latest.clone()],
            cache_from,
            build_args: self.build_args(context),
        });

        if let Some(mirror) = &self.targets.mirror {
            let target = format!("{}:{}", mirror.repository, LATEST_TAG);
            steps.push(PublishStep::Tag {
                source: latest,
                target: target.clone(),
            });
            steps.push(PublishStep::Push {
                role: RegistryRole::Mirror,
                image: target,
            });
        }

        Ok(PublishPlan {
            path: Some(PublishPath::MainBranch),
            steps,
        })
    }

    fn tag_plan(&self, context: &TriggerContext, tag: &str) -> Result<PublishPlan, PublishError> {
        validate_image_tag(tag)?;
        validate_image_tag(&context.commit_sha)?;

        let built = self.primary_ref(tag);
        let mut tags = vec![self.primary_ref(&context.commit_sha)];
        if !tags.contains(&built) {
            tags.push(built.clone());
        }

        let mut steps = self.login_steps();
        steps.push(PublishStep::Build {
            context: self.config.dockerfile_context.clone(),
            tags,
            cache_from: None,
            build_args: self.build_args(context),
        });

        if let Some(mirror) = &self.targets.mirror {
            let source = match self.config.mirror_source {
                MirrorSource::Built => built,
                MirrorSource::Latest => {
                    tracing::warn!(
                        tag = %tag,
                        "Mirroring primary :latest under the release tag; the mirror may not match the released image"
                    );
                    let latest = self.primary_ref(LATEST_TAG);
                    steps.push(PublishStep::Pull {
                        image: latest.clone(),
                    });
                    latest
                }
            };

            let target = format!("{}:{}", mirror.repository, tag);
            steps.push(PublishStep::Tag {
                source,
                target: target.clone(),
            });
            steps.push(PublishStep::Push {
                role: RegistryRole::Mirror,
                image: target,
            });
        }

        Ok(PublishPlan {
            path: Some(PublishPath::Tag),
            steps,
        })
    }

    fn login_steps(&self) -> Vec<PublishStep> {
        let primary = &self.targets.primary.credentials;
        let mut steps = vec![PublishStep::Login {
            role: RegistryRole::Primary,
            host: primary.host.clone(),
            username: primary.username.clone(),
        }];

        if let Some(mirror) = &self.targets.mirror {
            steps.push(PublishStep::Login {
                role: RegistryRole::Mirror,
                host: mirror.credentials.host.clone(),
                username: mirror.credentials.username.clone(),
            });
        }

        steps
    }

    fn build_args(&self, context: &TriggerContext) -> BTreeMap<String, String> {
        let mut args = self.config.build_args.clone();
        args.insert("VCS_REF".to_string(), context.commit_sha.clone());
        args.insert("VCS_URL".to_string(), context.project_url.clone());
        args
    }

    fn primary_ref(&self, tag: &str) -> String {
        format!("{}:{}", self.targets.primary.image, tag)
    }
}

fn validate_image_tag(tag: &str) -> Result<(), PublishError> {
    if IMAGE_TAG.is_match(tag) {
        Ok(())
    } else {
        Err(PublishError::InvalidImageTag(tag.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{
        MirrorRegistry, PrimaryRegistry, RegistryCredentials, CI_REGISTRY_USER, DOCKER_HUB_HOST,
    };
    use crate::core::context::{GitRef, PipelineSource};
    use secrecy::SecretString;
    use std::collections::HashMap;

    const IMAGE: &str = "registry.gitlab.com/group/deploy-helper";
    const SHA: &str = "3f2a9c1b";

    fn targets(with_mirror: bool) -> RegistryTargets {
        RegistryTargets {
            primary: PrimaryRegistry {
                credentials: RegistryCredentials {
                    host: "registry.gitlab.com".to_string(),
                    username: CI_REGISTRY_USER.to_string(),
                    token: SecretString::from("job-token".to_string()),
                },
                image: IMAGE.to_string(),
            },
            mirror: with_mirror.then(|| MirrorRegistry {
                credentials: RegistryCredentials {
                    host: DOCKER_HUB_HOST.to_string(),
                    username: "owner".to_string(),
                    token: SecretString::from("hub-token".to_string()),
                },
                repository: "owner/deploy-helper".to_string(),
            }),
        }
    }

    fn context(git_ref: GitRef, source: PipelineSource) -> TriggerContext {
        TriggerContext {
            pipeline_source: source,
            git_ref,
            commit_sha: SHA.to_string(),
            project_url: "https://gitlab.com/group/bukkit-plugins".to_string(),
        }
    }

    fn branch(name: &str) -> GitRef {
        GitRef::Branch(name.to_string())
    }

    fn plan(targets: &RegistryTargets, context: &TriggerContext) -> PublishPlan {
        let config = PublishConfig::default();
        PublishPlanner::new(&config, targets).plan(context).unwrap()
    }

    fn primary_pushes(plan: &PublishPlan) -> Vec<String> {
        plan.pushed_images()
            .into_iter()
            .filter(|image| image.starts_with(IMAGE))
            .collect()
    }

    #[test]
    fn test_main_branch_push_seeds_cache_before_build() {
        let targets = targets(false);
        let plan = plan(&targets, &context(branch("main"), PipelineSource::Push));

        assert_eq!(plan.path, Some(PublishPath::MainBranch));
        let names: Vec<_> = plan.steps.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["login", "cache-pull", "build"]);
        assert!(plan.steps[1].is_tolerated());

        match &plan.steps[2] {
            PublishStep::Build {
                tags, cache_from, ..
            } => {
                assert_eq!(tags, &vec![format!("{}:latest", IMAGE)]);
                assert_eq!(cache_from.as_deref(), Some(&*format!("{}:latest", IMAGE)));
            }
            other => panic!("expected build step, got {:?}", other),
        }
    }

    #[test]
    fn test_master_is_a_main_branch() {
        let targets = targets(false);
        let plan = plan(&targets, &context(branch("master"), PipelineSource::Push));
        assert_eq!(plan.path, Some(PublishPath::MainBranch));
    }

    #[test]
    fn test_schedule_skips_cache_pull() {
        let targets = targets(true);
        let plan = plan(&targets, &context(branch("main"), PipelineSource::Schedule));

        assert!(
            !plan
                .steps
                .iter()
                .any(|s| matches!(s, PublishStep::CachePull { .. }))
        );
        let build = plan
            .steps
            .iter()
            .find(|s| matches!(s, PublishStep::Build { .. }))
            .unwrap();
        assert!(!build.command_line().contains("--cache-from"));
    }

    #[test]
    fn test_main_branch_pushes_latest_once() {
        let targets = targets(false);
        let plan = plan(&targets, &context(branch("main"), PipelineSource::Push));
        assert_eq!(primary_pushes(&plan), vec![format!("{}:latest", IMAGE)]);
    }

    #[test]
    fn test_main_branch_mirror() {
        let targets = targets(true);
        let plan = plan(&targets, &context(branch("main"), PipelineSource::Push));

        let names: Vec<_> = plan.steps.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["login", "login", "cache-pull", "build", "tag", "push"]
        );
        assert_eq!(
            plan.steps[4],
            PublishStep::Tag {
                source: format!("{}:latest", IMAGE),
                target: "owner/deploy-helper:latest".to_string(),
            }
        );
        assert_eq!(plan.steps[5].role(), RegistryRole::Mirror);
    }

    #[test]
    fn test_tag_pushes_sha_and_tag_only() {
        let targets = targets(false);
        let plan = plan(
            &targets,
            &context(GitRef::Tag("1.4.0".to_string()), PipelineSource::Push),
        );

        assert_eq!(plan.path, Some(PublishPath::Tag));
        let pushed = primary_pushes(&plan);
        assert_eq!(
            pushed,
            vec![format!("{}:{}", IMAGE, SHA), format!("{}:1.4.0", IMAGE)]
        );
        assert!(!pushed.iter().any(|image| image.ends_with(":latest")));
        assert!(
            !plan
                .steps
                .iter()
                .any(|s| matches!(s, PublishStep::CachePull { .. }))
        );
    }

    #[test]
    fn test_tag_mirror_uses_built_image_by_default() {
        let targets = targets(true);
        let plan = plan(
            &targets,
            &context(GitRef::Tag("1.4.0".to_string()), PipelineSource::Push),
        );

        let tag = plan
            .steps
            .iter()
            .find(|s| matches!(s, PublishStep::Tag { .. }))
            .unwrap();
        assert_eq!(
            tag,
            &PublishStep::Tag {
                source: format!("{}:1.4.0", IMAGE),
                target: "owner/deploy-helper:1.4.0".to_string(),
            }
        );
        assert!(
            !plan
                .steps
                .iter()
                .any(|s| matches!(s, PublishStep::Pull { .. }))
        );
    }

    #[test]
    fn test_tag_mirror_from_latest_pulls_it_first() {
        let targets = targets(true);
        let config = PublishConfig {
            mirror_source: MirrorSource::Latest,
            ..Default::default()
        };
        let plan = PublishPlanner::new(&config, &targets)
            .plan(&context(
                GitRef::Tag("1.4.0".to_string()),
                PipelineSource::Push,
            ))
            .unwrap();

        let names: Vec<_> = plan.steps.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["login", "login", "build", "pull", "tag", "push"]);
        assert_eq!(
            plan.steps[4],
            PublishStep::Tag {
                source: format!("{}:latest", IMAGE),
                target: "owner/deploy-helper:1.4.0".to_string(),
            }
        );
    }

    #[test]
    fn test_other_branch_has_no_plan() {
        let targets = targets(true);
        let plan = plan(&targets, &context(branch("feature/x"), PipelineSource::Push));
        assert!(plan.path.is_none());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_scheduled_other_branch_has_no_plan() {
        let targets = targets(false);
        let plan = plan(&targets, &context(branch("develop"), PipelineSource::Schedule));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_invalid_tag_is_rejected() {
        let targets = targets(false);
        let config = PublishConfig::default();
        let err = PublishPlanner::new(&config, &targets)
            .plan(&context(
                GitRef::Tag("release/1.0".to_string()),
                PipelineSource::Push,
            ))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_IMAGE_TAG");
    }

    #[test]
    fn test_build_args_carry_provenance() {
        let targets = targets(false);
        let config = PublishConfig {
            build_args: BTreeMap::from([("JAVA_VERSION".to_string(), "17".to_string())]),
            ..Default::default()
        };
        let plan = PublishPlanner::new(&config, &targets)
            .plan(&context(branch("main"), PipelineSource::Push))
            .unwrap();

        let line = plan.steps[2].command_line();
        assert!(line.starts_with("docker buildx build --pull --push"));
        assert!(line.contains(&format!("--build-arg VCS_REF={}", SHA)));
        assert!(line.contains("--build-arg VCS_URL=https://gitlab.com/group/bukkit-plugins"));
        assert!(line.contains("--build-arg JAVA_VERSION=17"));
        assert!(line.ends_with(" ."));
    }

    #[test]
    fn test_login_uses_password_stdin() {
        let targets = targets(true);
        let plan = plan(&targets, &context(branch("main"), PipelineSource::Push));

        assert_eq!(
            plan.steps[0].command_line(),
            "docker login --username gitlab-ci-token --password-stdin registry.gitlab.com"
        );
        assert_eq!(
            plan.steps[1].command_line(),
            "docker login --username owner --password-stdin docker.io"
        );
    }

    #[test]
    fn test_plan_serialization_has_no_secrets() {
        let targets = targets(true);
        let plan = plan(&targets, &context(branch("main"), PipelineSource::Push));

        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"path\":\"main_branch\""));
        assert!(json.contains("\"step\":\"cache_pull\""));
        assert!(!json.contains("job-token"));
        assert!(!json.contains("hub-token"));
    }

    #[test]
    fn test_merge_request_on_main_has_no_plan() {
        let targets = targets(true);
        let plan = plan(
            &targets,
            &context(
                branch("main"),
                PipelineSource::Other("merge_request_event".to_string()),
            ),
        );
        assert!(plan.path.is_none());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_tag_from_web_pipeline_still_publishes() {
        let targets = targets(false);
        let plan = plan(
            &targets,
            &context(
                GitRef::Tag("1.4.0".to_string()),
                PipelineSource::Other("web".to_string()),
            ),
        );
        assert_eq!(plan.path, Some(PublishPath::Tag));
    }

    #[test]
    fn test_dry_run_lines_mask_tokens() {
        let targets = targets(true);
        let config = PublishConfig {
            build_args: BTreeMap::from([(
                "HUB_TOKEN".to_string(),
                "hub-token-0123456789".to_string(),
            )]),
            ..Default::default()
        };
        let plan = PublishPlanner::new(&config, &targets)
            .plan(&context(branch("main"), PipelineSource::Push))
            .unwrap();
        let tokens = SecureTokenManager::from_env(&HashMap::from([
            ("CI_JOB_TOKEN".to_string(), "job-token-0123456789".to_string()),
            ("DOCKER_HUB_TOKEN".to_string(), "hub-token-0123456789".to_string()),
        ]));

        let lines = plan.dry_run_lines(&tokens);
        assert_eq!(lines.len(), plan.steps.len());
        assert!(lines.iter().all(|line| !line.contains("token-0123456789")));
        assert!(lines.iter().any(|line| line.contains("--build-arg HUB_TOKEN=hub...789")));
        assert!(lines[2].ends_with("(tolerated)"));
        assert!(lines.iter().any(|line| line == "docker push owner/deploy-helper:latest"));
    }
}
