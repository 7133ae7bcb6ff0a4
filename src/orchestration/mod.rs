//! Publish orchestration
//!
//! Planning decides which publish path a trigger selects; the image
//! publisher runs that plan against the registries.

pub mod image_publisher;
pub mod plan;

pub use image_publisher::{ImagePublisher, PublishReport};
pub use plan::{PublishPath, PublishPlan, PublishPlanner, PublishStep, RegistryRole};
