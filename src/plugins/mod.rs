pub mod git_context;
pub mod github_dispatch;
pub mod npm_plugin;
pub mod plugin_loader;
pub mod pnpm_plugin;
pub mod step_output;

pub use git_context::GitRunContext;
pub use github_dispatch::GithubDispatchNotifier;
pub use npm_plugin::NpmRegistryClient;
pub use plugin_loader::{PluginLoader, PluginSet};
pub use pnpm_plugin::{PackageManager, PackageManagerInfoClient};
pub use step_output::StepOutputNotifier;
