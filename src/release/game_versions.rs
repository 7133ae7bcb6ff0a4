//! Game versions a plugin release declares support for

use crate::core::error::PublishError;
use lazy_static::lazy_static;
use regex::Regex;

/// Minimum assumed when a project does not declare `bukkit-api-version`
pub const DEFAULT_MINIMUM_VERSION: &str = "1.14.4";

/// Every game version a release can be marked compatible with, oldest first
pub const AVAILABLE_GAME_VERSIONS: &[&str] = &[
    "1.12", "1.12.1", "1.12.2", "1.13", "1.13.1", "1.13.2", "1.14", "1.14.1", "1.14.2", "1.14.3",
    "1.14.4", "1.15", "1.15.1", "1.15.2", "1.16", "1.16.1", "1.16.2", "1.16.3", "1.16.4",
    "1.16.5", "1.17", "1.17.1", "1.18", "1.18.1", "1.18.2", "1.19", "1.19.1", "1.19.2", "1.19.3",
    "1.19.4",
];

lazy_static! {
    static ref VERSION_PARTS: Regex = Regex::new(r"^(\d+\.\d+)\.?(\d+)?").unwrap();
}

/// Reduce a version to its `major.minor` base when it has a patch component.
///
/// The API level of a plugin covers the whole minor line, so `1.16.5`
/// supports every `1.16.x` release.
pub fn base_version(version: &str) -> &str {
    match VERSION_PARTS.captures(version) {
        Some(caps) if caps.get(2).is_some() => caps.get(1).map_or(version, |m| m.as_str()),
        _ => version,
    }
}

/// All available versions from the base of `minimum` upwards
pub fn supported_versions(minimum: &str) -> Result<Vec<String>, PublishError> {
    let base = base_version(minimum.trim());
    let start = AVAILABLE_GAME_VERSIONS
        .iter()
        .position(|v| *v == base)
        .ok_or_else(|| PublishError::UnknownGameVersion(minimum.to_string()))?;

    Ok(AVAILABLE_GAME_VERSIONS[start..]
        .iter()
        .map(|v| v.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_version() {
        assert_eq!(base_version("1.14.4"), "1.14");
        assert_eq!(base_version("1.19"), "1.19");
        assert_eq!(base_version("1.16.5"), "1.16");
        assert_eq!(base_version("snapshot"), "snapshot");
    }

    #[test]
    fn test_default_minimum_covers_minor_line() {
        let versions = supported_versions(DEFAULT_MINIMUM_VERSION).unwrap();
        assert_eq!(versions.first().map(String::as_str), Some("1.14"));
        assert_eq!(versions.last().map(String::as_str), Some("1.19.4"));
        assert_eq!(versions.len(), AVAILABLE_GAME_VERSIONS.len() - 6);
    }

    #[test]
    fn test_minor_only_minimum() {
        let versions = supported_versions("1.19").unwrap();
        assert_eq!(versions, vec!["1.19", "1.19.1", "1.19.2", "1.19.3", "1.19.4"]);
    }

    #[test]
    fn test_unknown_minimum() {
        let err = supported_versions("1.8.8").unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_GAME_VERSION");
    }
}
