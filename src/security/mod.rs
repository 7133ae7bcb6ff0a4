pub mod command_executor;
pub mod token_manager;

pub use command_executor::{CommandError, CommandOutput, CommandRunner, SafeCommandExecutor};
pub use token_manager::SecureTokenManager;
