pub mod core;
pub mod fakes;
pub mod orchestration;
pub mod plugins;
pub mod security;
pub mod telemetry;

pub use crate::core::*;
pub use orchestration::{PublishConfirmationPoller, PublishGate, PublishOrchestrator};
pub use plugins::{PluginLoader, PluginSet};
pub use security::{CommandError, SafeCommandExecutor, SecureTokenManager};
