//! Changelog extraction
//!
//! Release notes come from the project's `CHANGELOG.md`, where every release
//! has a section headed `## <version> (<YYYY-MM-DD>)`.

use crate::core::error::PublishError;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const CHANGELOG_FILE: &str = "CHANGELOG.md";

/// Release notes handed to the next CI job
pub const RELEASE_NOTES_FILE: &str = "ci-release.md";

lazy_static! {
    static ref SECTION_HEADER: Regex =
        Regex::new(r"^([0-9.]+) \((\d{4}-\d{2}-\d{2})\)$").unwrap();
}

/// Lines of the section for `version`, trimmed and joined.
///
/// Returns an empty string when no section matches or the section is empty.
pub fn extract_section(content: &str, version: &str) -> String {
    let mut section_lines = Vec::new();
    let mut in_section = false;

    for line in content.lines() {
        let line = line.trim();

        if line.starts_with("## ") {
            in_section = false;
            let header = line.trim_matches('#').trim();

            if let Some(caps) = SECTION_HEADER.captures(header)
                && &caps[1] == version
            {
                in_section = true;
            }
        } else if in_section {
            section_lines.push(line);
        }
    }

    section_lines.join("\n").trim().to_string()
}

/// Read the changelog entry for `version` from the project root.
///
/// A missing changelog yields an empty entry; a changelog without the
/// version is logged as a warning.
pub async fn read_entry(project_dir: &Path, version: &str) -> Result<String, PublishError> {
    let path = project_dir.join(CHANGELOG_FILE);
    if !path.exists() {
        tracing::info!(path = %path.display(), "No changelog found");
        return Ok(String::new());
    }

    tracing::info!(path = %path.display(), "Reading changelog");
    let content = fs::read_to_string(&path).await?;
    let entry = extract_section(&content, version);

    if entry.is_empty() {
        tracing::warn!(%version, "Version not found in changelog or changelog entry is empty");
    } else {
        tracing::info!(%version, "Found version in changelog");
    }

    Ok(entry)
}

/// Write the release notes next to the project for later pipeline jobs
pub async fn save_release_notes(project_dir: &Path, notes: &str) -> Result<PathBuf, PublishError> {
    let path = project_dir.join(RELEASE_NOTES_FILE);
    fs::write(&path, notes).await?;
    Ok(path)
}
