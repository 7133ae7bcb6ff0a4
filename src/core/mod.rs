pub mod config;
pub mod config_loader;
pub mod context;
pub mod error;
pub mod traits;

pub use config::*;
pub use config_loader::*;
pub use context::*;
pub use error::*;
pub use traits::*;
