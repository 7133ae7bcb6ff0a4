//! Plugin release distribution

pub mod changelog;
pub mod game_versions;
pub mod modrinth;
pub mod uploader;

pub use modrinth::ModrinthTarget;
pub use uploader::{ReleaseEnvironment, ReleaseUploader};
