//! Build Descriptor - the parent build configuration inherited by plugin projects
//!
//! The descriptor is declarative: it pins the plugin host API as a
//! compile-only dependency, turns on resource filtering, fixes the Java
//! release level, merges runtime dependencies into one jar at package time
//! and tags releases with the bare project version. The external build tool
//! consumes the rendered `pom.xml`; this module only models and checks it.

use crate::core::error::PublishError;
use crate::core::traits::ValidationResult;
use crate::validation::VersionValidator;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tag-name format that makes the release tag equal the version
pub const RELEASE_TAG_FORMAT: &str = "@{project.version}";

/// Property that pins the host API version
pub const HOST_API_VERSION_PROPERTY: &str = "spigot.version";

const DEFAULT_HOST_API_VERSION: &str = "1.19.4-R0.1-SNAPSHOT";

/// Nested property references are resolved up to this depth
const MAX_RESOLVE_DEPTH: usize = 8;

lazy_static! {
    static ref PROPERTY_REF: Regex = Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").unwrap();
    /// Property keys become element names in the rendered document
    static ref PROPERTY_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap();
}

/// Dependency scope as understood by the build tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    Compile,
    Provided,
    Runtime,
    Test,
}

impl DependencyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Provided => "provided",
            Self::Runtime => "runtime",
            Self::Test => "test",
        }
    }

    /// Whether the shade step merges dependencies of this scope
    pub fn is_bundled(&self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    /// Literal version or a `${property}` reference
    pub version: String,
    pub scope: DependencyScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDirectory {
    pub directory: String,
    /// Substitute `${…}` tokens in packaged resources
    pub filtering: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerSettings {
    pub plugin_version: String,
    /// Java release level (`maven.compiler.release`)
    pub release: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadeSettings {
    pub plugin_version: String,
    pub phase: String,
    pub goal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSettings {
    pub plugin_version: String,
    pub tag_name_format: String,
    /// Allow tagging while snapshot dependencies remain
    pub allow_timestamped_snapshots: bool,
}

/// Parent build descriptor shared by the plugin projects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDescriptor {
    pub coordinates: Coordinates,
    pub name: Option<String>,
    pub properties: BTreeMap<String, String>,
    /// Plugin host API the children compile against
    pub host_api: Dependency,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub repositories: Vec<Repository>,
    pub resources: Vec<ResourceDirectory>,
    pub compiler: CompilerSettings,
    pub shade: ShadeSettings,
    pub release: ReleaseSettings,
}

impl Default for BuildDescriptor {
    fn default() -> Self {
        let properties = BTreeMap::from([
            (
                "project.build.sourceEncoding".to_string(),
                "UTF-8".to_string(),
            ),
            ("maven.compiler.release".to_string(), "17".to_string()),
            (
                HOST_API_VERSION_PROPERTY.to_string(),
                DEFAULT_HOST_API_VERSION.to_string(),
            ),
        ]);

        Self {
            coordinates: Coordinates {
                group_id: "io.gitlab.bukkitplugins".to_string(),
                artifact_id: "parent".to_string(),
                version: "1.0.0".to_string(),
            },
            name: Some("Bukkit plugins parent".to_string()),
            properties,
            host_api: Dependency {
                group_id: "org.spigotmc".to_string(),
                artifact_id: "spigot-api".to_string(),
                version: format!("${{{}}}", HOST_API_VERSION_PROPERTY),
                scope: DependencyScope::Provided,
            },
            dependencies: Vec::new(),
            repositories: vec![Repository {
                id: "spigot-repo".to_string(),
                url: "https://hub.spigotmc.org/nexus/content/repositories/snapshots/".to_string(),
            }],
            resources: vec![ResourceDirectory {
                directory: "src/main/resources".to_string(),
                filtering: true,
            }],
            compiler: CompilerSettings {
                plugin_version: "3.11.0".to_string(),
                release: 17,
            },
            shade: ShadeSettings {
                plugin_version: "3.5.0".to_string(),
                phase: "package".to_string(),
                goal: "shade".to_string(),
            },
            release: ReleaseSettings {
                plugin_version: "3.0.1".to_string(),
                tag_name_format: RELEASE_TAG_FORMAT.to_string(),
                allow_timestamped_snapshots: true,
            },
        }
    }
}

impl BuildDescriptor {
    /// Load a descriptor definition from YAML
    pub async fn from_yaml_file(path: &Path) -> Result<Self, PublishError> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| {
            PublishError::DescriptorInvalid(format!("{}: {}", path.display(), e))
        })
    }

    /// Replace `${name}` references with property or project values.
    ///
    /// Unknown references are left in place so callers can detect them.
    pub fn resolve_property(&self, value: &str) -> String {
        let mut current = value.to_string();

        for _ in 0..MAX_RESOLVE_DEPTH {
            if !PROPERTY_REF.is_match(&current) {
                break;
            }
            let next = PROPERTY_REF
                .replace_all(&current, |caps: &regex::Captures| {
                    self.lookup(&caps[1])
                        .unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned();
            if next == current {
                break;
            }
            current = next;
        }

        current
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "project.groupId" => Some(self.coordinates.group_id.clone()),
            "project.artifactId" => Some(self.coordinates.artifact_id.clone()),
            "project.version" => Some(self.coordinates.version.clone()),
            other => self.properties.get(other).cloned(),
        }
    }

    /// Concrete host API version after property resolution
    pub fn host_api_version(&self) -> Option<String> {
        let resolved = self.resolve_property(&self.host_api.version);
        if resolved.trim().is_empty() || PROPERTY_REF.is_match(&resolved) {
            None
        } else {
            Some(resolved)
        }
    }

    /// Render as a `pom.xml` document
    pub fn render(&self) -> String {
        crate::descriptor::pom::render(self)
    }

    /// Dependencies the shade step merges into the output jar
    pub fn bundled_dependencies(&self) -> Vec<&Dependency> {
        std::iter::once(&self.host_api)
            .chain(self.dependencies.iter())
            .filter(|dependency| dependency.scope.is_bundled())
            .collect()
    }

    /// Check the descriptor against the conventions children rely on
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let versions = VersionValidator::new();

        if self.coordinates.group_id.trim().is_empty() {
            result.error("coordinates.groupId", "groupId is required");
        }
        if self.coordinates.artifact_id.trim().is_empty() {
            result.error("coordinates.artifactId", "artifactId is required");
        }
        let version = versions.validate(&self.coordinates.version);
        if !version.is_valid {
            result.error(
                "coordinates.version",
                version.error.unwrap_or_else(|| "invalid version".to_string()),
            );
        }

        match self.host_api_version() {
            Some(resolved) => {
                if versions.is_snapshot(&resolved) {
                    result.warning(
                        "hostApi.version",
                        format!("{} resolves to snapshot {}", self.host_api.artifact_id, resolved),
                    );
                }
            }
            None => result.error(
                "hostApi.version",
                format!(
                    "{} does not resolve to a concrete version",
                    self.host_api.version
                ),
            ),
        }
        if self.host_api.scope != DependencyScope::Provided {
            result.error(
                "hostApi.scope",
                format!(
                    "host API must be provided, not {}; it would be bundled into every plugin jar",
                    self.host_api.scope.as_str()
                ),
            );
        }

        for key in self.properties.keys() {
            if !PROPERTY_NAME.is_match(key) {
                result.error(
                    &format!("properties.{}", key),
                    format!("'{}' is not a valid property name", key),
                );
            }
        }

        for (idx, dependency) in self.dependencies.iter().enumerate() {
            let resolved = self.resolve_property(&dependency.version);
            if PROPERTY_REF.is_match(&resolved) || resolved.trim().is_empty() {
                result.error(
                    &format!("dependencies[{}].version", idx),
                    format!("{} has no concrete version", dependency.artifact_id),
                );
            }
        }

        if !self.resources.iter().any(|r| r.filtering) {
            result.warning("resources", "no filtered resource directory");
        }

        if self.compiler.release < 8 {
            result.error(
                "compiler.release",
                format!("Java release {} is not supported", self.compiler.release),
            );
        }
        if let Some(property) = self.properties.get("maven.compiler.release")
            && property != &self.compiler.release.to_string()
        {
            result.warning(
                "properties.maven.compiler.release",
                format!(
                    "property {} differs from compiler release {}",
                    property, self.compiler.release
                ),
            );
        }

        if self.shade.phase != "package" || self.shade.goal != "shade" {
            result.error(
                "shade",
                format!(
                    "shade must run goal 'shade' in phase 'package', found '{}' in '{}'",
                    self.shade.goal, self.shade.phase
                ),
            );
        }

        if self.release.tag_name_format != RELEASE_TAG_FORMAT {
            result.error(
                "release.tagNameFormat",
                format!(
                    "release tags must equal the version ({}), {} would tag {} as {}",
                    RELEASE_TAG_FORMAT,
                    self.release.tag_name_format,
                    self.coordinates.version,
                    versions.tag_name(&self.release.tag_name_format, &self.coordinates.version)
                ),
            );
        }

        result.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_descriptor_is_valid() {
        let result = BuildDescriptor::default().validate();
        assert!(result.valid, "errors: {:?}", result.errors);
        // The pinned host API is a snapshot build
        assert!(result.warnings.iter().any(|w| w.field == "hostApi.version"));
    }

    #[test]
    fn test_host_api_resolves_to_fixed_version() {
        let descriptor = BuildDescriptor::default();
        assert_eq!(
            descriptor.host_api_version(),
            Some("1.19.4-R0.1-SNAPSHOT".to_string())
        );
    }

    #[test]
    fn test_host_api_is_not_bundled() {
        let mut descriptor = BuildDescriptor::default();
        descriptor.dependencies.push(Dependency {
            group_id: "org.bstats".to_string(),
            artifact_id: "bstats-bukkit".to_string(),
            version: "3.0.2".to_string(),
            scope: DependencyScope::Compile,
        });

        let bundled: Vec<_> = descriptor
            .bundled_dependencies()
            .iter()
            .map(|d| d.artifact_id.as_str())
            .collect();
        assert_eq!(bundled, vec!["bstats-bukkit"]);
    }

    #[test]
    fn test_compile_scoped_host_api_is_rejected() {
        let mut descriptor = BuildDescriptor::default();
        descriptor.host_api.scope = DependencyScope::Compile;

        let result = descriptor.validate();
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.field == "hostApi.scope"));
        assert_eq!(descriptor.bundled_dependencies().len(), 1);
    }

    #[test]
    fn test_unresolved_host_api_version() {
        let mut descriptor = BuildDescriptor::default();
        descriptor.properties.remove(HOST_API_VERSION_PROPERTY);

        assert_eq!(descriptor.host_api_version(), None);
        let result = descriptor.validate();
        assert!(result.errors.iter().any(|e| e.field == "hostApi.version"));
    }

    #[test]
    fn test_nested_property_resolution() {
        let mut descriptor = BuildDescriptor::default();
        descriptor
            .properties
            .insert("mc.version".to_string(), "1.20.1".to_string());
        descriptor.properties.insert(
            HOST_API_VERSION_PROPERTY.to_string(),
            "${mc.version}-R0.1-SNAPSHOT".to_string(),
        );

        assert_eq!(
            descriptor.host_api_version(),
            Some("1.20.1-R0.1-SNAPSHOT".to_string())
        );
        assert_eq!(
            descriptor.resolve_property("${project.artifactId}-${project.version}"),
            "parent-1.0.0"
        );
    }

    #[test]
    fn test_self_referencing_property_terminates() {
        let mut descriptor = BuildDescriptor::default();
        descriptor
            .properties
            .insert("loop".to_string(), "${loop}".to_string());
        assert_eq!(descriptor.resolve_property("${loop}"), "${loop}");
    }

    #[test]
    fn test_tag_format_must_be_version() {
        let mut descriptor = BuildDescriptor::default();
        descriptor.release.tag_name_format = "v@{project.version}".to_string();

        let result = descriptor.validate();
        assert!(!result.valid);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.field == "release.tagNameFormat" && e.message.ends_with("as v1.0.0"))
        );
    }

    #[test]
    fn test_property_names_must_be_element_names() {
        for key in ["bad key", "a<b", "R&D", "1st"] {
            let mut descriptor = BuildDescriptor::default();
            descriptor
                .properties
                .insert(key.to_string(), "value".to_string());

            let result = descriptor.validate();
            assert!(!result.valid, "{} should be rejected", key);
            assert!(result.errors.iter().any(|e| e.field == format!("properties.{}", key)));
        }
    }

    #[test]
    fn test_shade_must_run_at_package() {
        let mut descriptor = BuildDescriptor::default();
        descriptor.shade.phase = "install".to_string();
        assert!(!descriptor.validate().valid);
    }

    #[tokio::test]
    async fn test_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("descriptor.yaml");
        let yaml = serde_yaml::to_string(&BuildDescriptor::default()).unwrap();
        std::fs::write(&path, yaml).unwrap();

        let loaded = BuildDescriptor::from_yaml_file(&path).await.unwrap();
        assert_eq!(loaded, BuildDescriptor::default());
    }

    #[tokio::test]
    async fn test_from_yaml_file_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("descriptor.yaml");
        std::fs::write(&path, "coordinates: 3\n").unwrap();

        let err = BuildDescriptor::from_yaml_file(&path).await.unwrap_err();
        assert_eq!(err.code(), "DESCRIPTOR_INVALID");
    }
}
