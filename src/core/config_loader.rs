//! Configuration file loader for plugin-publisher
//!
//! This module provides configuration loading and merging capabilities.

use super::config::*;
use crate::core::error::PublishError;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".plugin-publisher.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Explicit config file, replaces the project file lookup
    pub config_file: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<ConfigFile>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.plugin-publisher.yaml)
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut layers: Vec<ConfigFile> = Vec::new();

        let file_path = options
            .config_file
            .clone()
            .unwrap_or_else(|| options.project_path.join(CONFIG_FILENAME));

        if let Some(file_config) = Self::load_config_file(&file_path, Vec::new()).await? {
            tracing::debug!(path = %file_path.display(), "Loaded configuration file");
            layers.push(file_config);
        } else if options.config_file.is_some() {
            return Err(PublishError::ConfigError(format!(
                "Config file not found: {}",
                file_path.display()
            )));
        }

        if let Some(env_config) = Self::load_env_config(&options.env) {
            layers.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            layers.push(cli_config);
        }

        let merged = Self::merge_layers(layers);
        let expanded = Self::expand_env_vars(merged, &options.env)?;

        Ok(Self::apply(PublishConfig::default(), expanded))
    }

    /// Load configuration from YAML file
    ///
    /// `chain` holds the canonical paths of the files that extend this one;
    /// meeting one of them again is a circular `extends`.
    fn load_config_file(
        file_path: &Path,
        chain: Vec<PathBuf>,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Option<ConfigFile>, PublishError>> + Send + '_>,
    > {
        Box::pin(async move {
            if !file_path.exists() {
                return Ok(None);
            }

            let canonical = fs::canonicalize(file_path).await.map_err(|e| {
                PublishError::ConfigError(format!("Failed to resolve config file: {}", e))
            })?;
            if chain.contains(&canonical) {
                return Err(PublishError::ConfigError(format!(
                    "circular extends: {} is extended by itself",
                    file_path.display()
                )));
            }

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                PublishError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: ConfigFile = serde_yaml::from_str(&content).map_err(|e| {
                PublishError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?;

            // Handle extends if present
            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| {
                        PublishError::ConfigError("Invalid config file path".to_string())
                    })?
                    .join(extends_path);

                let mut chain = chain;
                chain.push(canonical);

                let base_config = Self::load_config_file(&base_path, chain)
                    .await?
                    .ok_or_else(|| {
                        PublishError::ConfigError(format!(
                            "Base config file not found: {} (extended by {})",
                            base_path.display(),
                            file_path.display()
                        ))
                    })?;
                return Ok(Some(Self::merge_layers(vec![base_config, config])));
            }

            Ok(Some(config))
        })
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<ConfigFile> {
        let mut config = ConfigFile::default();
        let mut has_changes = false;

        // PUBLISH_MAIN_BRANCHES -> mainBranches (comma separated)
        if let Some(branches) = env.get("PUBLISH_MAIN_BRANCHES") {
            let branches: Vec<String> = branches
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !branches.is_empty() {
                config.main_branches = Some(branches);
                has_changes = true;
            }
        }

        // PUBLISH_MIRROR_SOURCE -> mirrorSource
        if let Some(source) = env.get("PUBLISH_MIRROR_SOURCE") {
            let source = match source.as_str() {
                "built" => Some(MirrorSource::Built),
                "latest" => Some(MirrorSource::Latest),
                other => {
                    tracing::warn!(value = %other, "Ignoring unknown PUBLISH_MIRROR_SOURCE");
                    None
                }
            };

            if source.is_some() {
                config.mirror_source = source;
                has_changes = true;
            }
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge layers in order; later layers win key by key
    fn merge_layers(layers: Vec<ConfigFile>) -> ConfigFile {
        let mut result = ConfigFile::default();

        for layer in layers {
            Self::merge_into(&mut result, layer);
        }

        result
    }

    fn merge_into(target: &mut ConfigFile, source: ConfigFile) {
        if source.extends.is_some() {
            target.extends = source.extends;
        }
        if source.main_branches.is_some() {
            target.main_branches = source.main_branches;
        }
        if source.dockerfile_context.is_some() {
            target.dockerfile_context = source.dockerfile_context;
        }
        if source.mirror_source.is_some() {
            target.mirror_source = source.mirror_source;
        }

        // Build args merge per key
        if let Some(source_args) = source.build_args {
            let target_args = target.build_args.get_or_insert_with(Default::default);
            target_args.extend(source_args);
        }
    }

    /// Fill the defaults with whatever the merged layers set
    fn apply(mut config: PublishConfig, layer: ConfigFile) -> PublishConfig {
        if let Some(branches) = layer.main_branches {
            config.main_branches = branches;
        }
        if let Some(context) = layer.dockerfile_context {
            config.dockerfile_context = context;
        }
        if let Some(source) = layer.mirror_source {
            config.mirror_source = source;
        }
        if let Some(args) = layer.build_args {
            config.build_args = args;
        }
        config
    }

    /// Expand ${VAR} references in build args and the build context
    fn expand_env_vars(
        mut config: ConfigFile,
        env: &HashMap<String, String>,
    ) -> Result<ConfigFile, PublishError> {
        if let Some(context) = &config.dockerfile_context {
            config.dockerfile_context = Some(Self::expand_string(context, env)?);
        }

        if let Some(args) = &mut config.build_args {
            for value in args.values_mut() {
                *value = Self::expand_string(value, env)?;
            }
        }

        Ok(config)
    }

    /// Expand environment variables in a single string
    fn expand_string(input: &str, env: &HashMap<String, String>) -> Result<String, PublishError> {
        let env_var_regex = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| PublishError::ConfigError(format!("Invalid pattern: {}", e)))?;

        let mut result = input.to_string();
        for cap in env_var_regex.captures_iter(input) {
            let var_name = &cap[1];
            let value = env.get(var_name).ok_or_else(|| {
                PublishError::ConfigError(format!(
                    "Environment variable {} referenced in config is not set",
                    var_name
                ))
            })?;
            result = result.replace(&cap[0], value);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &Path) -> ConfigLoadOptions {
        ConfigLoadOptions {
            project_path: dir.to_path_buf(),
            config_file: None,
            cli_args: None,
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_defaults_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::load(options(temp_dir.path())).await.unwrap();
        assert_eq!(config, PublishConfig::default());
    }

    #[tokio::test]
    async fn test_project_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "mainBranches: [trunk]\ndockerfileContext: deploy-helper\n",
        )
        .unwrap();

        let config = ConfigLoader::load(options(temp_dir.path())).await.unwrap();
        assert_eq!(config.main_branches, vec!["trunk".to_string()]);
        assert_eq!(config.dockerfile_context, "deploy-helper");
        assert_eq!(config.mirror_source, MirrorSource::Built);
    }

    #[tokio::test]
    async fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "mirrorSource: built\n",
        )
        .unwrap();

        let mut opts = options(temp_dir.path());
        opts.env
            .insert("PUBLISH_MIRROR_SOURCE".to_string(), "latest".to_string());
        opts.env
            .insert("PUBLISH_MAIN_BRANCHES".to_string(), "main, release".to_string());

        let config = ConfigLoader::load(opts).await.unwrap();
        assert_eq!(config.mirror_source, MirrorSource::Latest);
        assert_eq!(
            config.main_branches,
            vec!["main".to_string(), "release".to_string()]
        );
    }

    #[tokio::test]
    async fn test_cli_overrides_env() {
        let temp_dir = TempDir::new().unwrap();
        let mut opts = options(temp_dir.path());
        opts.env
            .insert("PUBLISH_MIRROR_SOURCE".to_string(), "latest".to_string());
        opts.cli_args = Some(ConfigFile {
            mirror_source: Some(MirrorSource::Built),
            ..Default::default()
        });

        let config = ConfigLoader::load(opts).await.unwrap();
        assert_eq!(config.mirror_source, MirrorSource::Built);
    }

    #[tokio::test]
    async fn test_extends_and_build_arg_expansion() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("base.yaml"),
            "buildArgs:\n  JAVA_VERSION: \"17\"\n  MAVEN_VERSION: \"3.9\"\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "extends: base.yaml\nbuildArgs:\n  MAVEN_VERSION: \"${MAVEN}\"\n",
        )
        .unwrap();

        let mut opts = options(temp_dir.path());
        opts.env.insert("MAVEN".to_string(), "3.8".to_string());

        let config = ConfigLoader::load(opts).await.unwrap();
        assert_eq!(config.build_args.get("JAVA_VERSION").unwrap(), "17");
        assert_eq!(config.build_args.get("MAVEN_VERSION").unwrap(), "3.8");
    }

    #[tokio::test]
    async fn test_self_extending_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            format!("extends: {}\n", CONFIG_FILENAME),
        )
        .unwrap();

        let err = ConfigLoader::load(options(temp_dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("circular extends"));
    }

    #[tokio::test]
    async fn test_extends_cycle_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.yaml"), "extends: b.yaml\n").unwrap();
        std::fs::write(temp_dir.path().join("b.yaml"), "extends: ./a.yaml\n").unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "extends: a.yaml\nmainBranches: [main]\n",
        )
        .unwrap();

        let err = ConfigLoader::load(options(temp_dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("circular extends"));
    }

    #[tokio::test]
    async fn test_missing_extends_target_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "extends: bsae.yaml\n",
        )
        .unwrap();

        let err = ConfigLoader::load(options(temp_dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("bsae.yaml"));
    }

    #[tokio::test]
    async fn test_unset_variable_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "buildArgs:\n  TOKEN: \"${NOT_SET}\"\n",
        )
        .unwrap();

        let err = ConfigLoader::load(options(temp_dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_explicit_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut opts = options(temp_dir.path());
        opts.config_file = Some(temp_dir.path().join("missing.yaml"));

        assert!(ConfigLoader::load(opts).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "mainBranches: {not: a list\n",
        )
        .unwrap();

        let err = ConfigLoader::load(options(temp_dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }
}
