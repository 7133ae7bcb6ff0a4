//! `pom.xml` rendering and child descriptor reading
//!
//! Rendering writes the parent descriptor out for the build tool. Reading is
//! deliberately shallow: release tooling only needs a child project's own
//! version and its `bukkit-api-version` property.

use crate::core::error::PublishError;
use crate::descriptor::build_descriptor::{BuildDescriptor, Dependency};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::Write;
use std::path::Path;

/// Property naming the oldest game version a plugin supports
pub const API_VERSION_PROPERTY: &str = "bukkit-api-version";

lazy_static! {
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref PARENT_BLOCK: Regex = Regex::new(r"(?s)<parent>(.*?)</parent>").unwrap();
    static ref NESTED_BLOCKS: Regex = Regex::new(
        r"(?s)<(dependencies|dependencyManagement|build|profiles|reporting|plugins|pluginManagement)>.*?</(dependencies|dependencyManagement|build|profiles|reporting|plugins|pluginManagement)>"
    )
    .unwrap();
    static ref VERSION: Regex = Regex::new(r"<version>\s*([^<]+?)\s*</version>").unwrap();
    static ref PROPERTIES: Regex = Regex::new(r"(?s)<properties>(.*?)</properties>").unwrap();
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn write_dependency(out: &mut String, dependency: &Dependency) {
    let _ = write!(
        out,
        "        <dependency>\n            <groupId>{}</groupId>\n            <artifactId>{}</artifactId>\n            <version>{}</version>\n            <scope>{}</scope>\n        </dependency>\n",
        escape(&dependency.group_id),
        escape(&dependency.artifact_id),
        escape(&dependency.version),
        dependency.scope.as_str()
    );
}

fn write_plugin(out: &mut String, artifact_id: &str, version: &str, body: &str) {
    let _ = write!(
        out,
        "            <plugin>\n                <groupId>org.apache.maven.plugins</groupId>\n                <artifactId>{}</artifactId>\n                <version>{}</version>\n{}            </plugin>\n",
        artifact_id,
        escape(version),
        body
    );
}

/// Render the descriptor as a `pom.xml` document
pub fn render(descriptor: &BuildDescriptor) -> String {
    let mut out = String::new();
    let coords = &descriptor.coordinates;

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<project xmlns=\"http://maven.apache.org/POM/4.0.0\"\n");
    out.push_str("         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n");
    out.push_str("         xsi:schemaLocation=\"http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd\">\n");
    out.push_str("    <modelVersion>4.0.0</modelVersion>\n\n");
    let _ = writeln!(out, "    <groupId>{}</groupId>", escape(&coords.group_id));
    let _ = writeln!(out, "    <artifactId>{}</artifactId>", escape(&coords.artifact_id));
    let _ = writeln!(out, "    <version>{}</version>", escape(&coords.version));
    out.push_str("    <packaging>pom</packaging>\n");
    if let Some(name) = &descriptor.name {
        let _ = writeln!(out, "    <name>{}</name>", escape(name));
    }

    out.push_str("\n    <properties>\n");
    for (key, value) in &descriptor.properties {
        let _ = writeln!(out, "        <{0}>{1}</{0}>", key, escape(value));
    }
    out.push_str("    </properties>\n");

    if !descriptor.repositories.is_empty() {
        out.push_str("\n    <repositories>\n");
        for repository in &descriptor.repositories {
            let _ = write!(
                out,
                "        <repository>\n            <id>{}</id>\n            <url>{}</url>\n        </repository>\n",
                escape(&repository.id),
                escape(&repository.url)
            );
        }
        out.push_str("    </repositories>\n");
    }

    out.push_str("\n    <dependencies>\n");
    write_dependency(&mut out, &descriptor.host_api);
    for dependency in &descriptor.dependencies {
        write_dependency(&mut out, dependency);
    }
    out.push_str("    </dependencies>\n");

    out.push_str("\n    <build>\n        <resources>\n");
    for resource in &descriptor.resources {
        let _ = write!(
            out,
            "            <resource>\n                <directory>{}</directory>\n                <filtering>{}</filtering>\n            </resource>\n",
            escape(&resource.directory),
            resource.filtering
        );
    }
    out.push_str("        </resources>\n        <plugins>\n");

    write_plugin(
        &mut out,
        "maven-compiler-plugin",
        &descriptor.compiler.plugin_version,
        &format!(
            "                <configuration>\n                    <release>{}</release>\n                </configuration>\n",
            descriptor.compiler.release
        ),
    );
    write_plugin(
        &mut out,
        "maven-shade-plugin",
        &descriptor.shade.plugin_version,
        &format!(
            "                <executions>\n                    <execution>\n                        <phase>{}</phase>\n                        <goals>\n                            <goal>{}</goal>\n                        </goals>\n                    </execution>\n                </executions>\n",
            escape(&descriptor.shade.phase),
            escape(&descriptor.shade.goal)
        ),
    );
    write_plugin(
        &mut out,
        "maven-release-plugin",
        &descriptor.release.plugin_version,
        &format!(
            "                <configuration>\n                    <tagNameFormat>{}</tagNameFormat>\n                    <allowTimestampedSnapshots>{}</allowTimestampedSnapshots>\n                </configuration>\n",
            escape(&descriptor.release.tag_name_format),
            descriptor.release.allow_timestamped_snapshots
        ),
    );

    out.push_str("        </plugins>\n    </build>\n</project>\n");
    out
}

/// What release tooling reads from a plugin project's own `pom.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDescriptor {
    /// Project version, or the parent's when the child inherits it
    pub version: Option<String>,
    /// Value of the `bukkit-api-version` property
    pub api_version: Option<String>,
}

impl ChildDescriptor {
    pub async fn read(path: &Path) -> Result<Self, PublishError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let content = COMMENT.replace_all(content, "");

        let parent_version = PARENT_BLOCK
            .captures(&content)
            .and_then(|caps| VERSION.captures(&caps[1]).map(|v| v[1].to_string()));

        let top_level = PARENT_BLOCK.replace_all(&content, "");
        let top_level = NESTED_BLOCKS.replace_all(&top_level, "");

        let own_version = VERSION.captures(&top_level).map(|v| v[1].to_string());

        let property_pattern = format!(
            r"<{0}>\s*([^<]+?)\s*</{0}>",
            regex::escape(API_VERSION_PROPERTY)
        );
        let api_version = Regex::new(&property_pattern).ok().and_then(|pattern| {
            PROPERTIES
                .captures(&top_level)
                .and_then(|props| pattern.captures(&props[1]).map(|v| v[1].to_string()))
        });

        Self {
            version: own_version.or(parent_version),
            api_version,
        }
    }
}
