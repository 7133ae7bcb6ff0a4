pub mod build_descriptor;
pub mod pom;

pub use build_descriptor::{
    BuildDescriptor, CompilerSettings, Coordinates, Dependency, DependencyScope,
    ReleaseSettings, Repository, ResourceDirectory, ShadeSettings, RELEASE_TAG_FORMAT,
};
pub use pom::{ChildDescriptor, API_VERSION_PROPERTY, render};
