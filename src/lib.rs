pub mod core;
pub mod descriptor;
pub mod orchestration;
pub mod release;
pub mod security;
pub mod validation;

pub use core::*;
pub use descriptor::{BuildDescriptor, ChildDescriptor};
pub use orchestration::{ImagePublisher, PublishPlan, PublishPlanner, PublishReport};
pub use release::{ModrinthTarget, ReleaseEnvironment, ReleaseUploader};
pub use security::{CommandRunner, SafeCommandExecutor, SecureTokenManager};
