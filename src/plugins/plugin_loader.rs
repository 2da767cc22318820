//! Plugin Loader - builds the collaborators of a publish run from configuration
//!
//! # Example
//!
//! ```no_run
//! use workspace_publisher::core::PublisherConfig;
//! use workspace_publisher::plugins::PluginLoader;
//! use workspace_publisher::security::SecureTokenManager;
//!
//! # fn example() -> Result<(), workspace_publisher::core::PublishError> {
//! let loader = PluginLoader::new(".");
//! let plugins = loader.load(&PublisherConfig::default(), SecureTokenManager::from_process_env())?;
//! println!("registry: {}, dispatch: {}", plugins.registry.name(), plugins.notifier.name());
//! # Ok(())
//! # }
//! ```

use crate::core::config::{DispatchTarget, PublisherConfig, RegistryClientKind};
use crate::core::error::PublishError;
use crate::core::traits::{DispatchNotifier, RegistryClient, RunContextProvider};
use crate::plugins::git_context::GitRunContext;
use crate::plugins::github_dispatch::GithubDispatchNotifier;
use crate::plugins::npm_plugin::NpmRegistryClient;
use crate::plugins::pnpm_plugin::{PackageManager, PackageManagerInfoClient};
use crate::plugins::step_output::StepOutputNotifier;
use crate::security::command_executor::SafeCommandExecutor;
use crate::security::token_manager::{REGISTRY_TOKEN, SecureTokenManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Collaborators of one publish run
pub struct PluginSet {
    pub registry: Arc<dyn RegistryClient>,
    pub notifier: Arc<dyn DispatchNotifier>,
    pub context: Arc<dyn RunContextProvider>,
}

/// Builds a [`PluginSet`] for a workspace
pub struct PluginLoader {
    project_path: PathBuf,
}

impl PluginLoader {
    /// Create a loader for the workspace at `project_path`
    pub fn new(project_path: impl AsRef<Path>) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
        }
    }

    fn executor(&self, config: &PublisherConfig) -> Result<SafeCommandExecutor, PublishError> {
        Ok(SafeCommandExecutor::new(&self.project_path)?.with_timeout(config.registry.timeout()))
    }

    /// Registry client selected by `registry.client`
    pub fn load_registry(
        &self,
        config: &PublisherConfig,
        tokens: &SecureTokenManager,
    ) -> Result<Arc<dyn RegistryClient>, PublishError> {
        let registry: Arc<dyn RegistryClient> = match config.registry.client {
            RegistryClientKind::Http => Arc::new(
                NpmRegistryClient::new(&config.registry.url, config.registry.timeout())
                    .with_token(tokens.get_token(REGISTRY_TOKEN)),
            ),
            RegistryClientKind::Pnpm => Arc::new(PackageManagerInfoClient::new(
                self.executor(config)?,
                PackageManager::Pnpm,
            )),
            RegistryClientKind::Npm => Arc::new(PackageManagerInfoClient::new(
                self.executor(config)?,
                PackageManager::Npm,
            )),
        };
        Ok(registry)
    }

    /// Dispatch notifier selected by `dispatch.target`
    pub fn load_notifier(
        &self,
        config: &PublisherConfig,
        tokens: SecureTokenManager,
    ) -> Result<Arc<dyn DispatchNotifier>, PublishError> {
        let notifier: Arc<dyn DispatchNotifier> = match config.dispatch.target {
            DispatchTarget::Github => {
                Arc::new(GithubDispatchNotifier::from_config(&config.dispatch, tokens)?)
            }
            DispatchTarget::StepOutput => Arc::new(StepOutputNotifier::from_path(
                config.dispatch.output_file.as_deref(),
            )?),
        };
        Ok(notifier)
    }

    /// Branch and commit lookup; git shares the registry command timeout
    pub fn load_context(
        &self,
        config: &PublisherConfig,
    ) -> Result<Arc<dyn RunContextProvider>, PublishError> {
        Ok(Arc::new(GitRunContext::new(self.executor(config)?)))
    }

    /// Build every collaborator; fails before any network call when settings are missing
    pub fn load(
        &self,
        config: &PublisherConfig,
        tokens: SecureTokenManager,
    ) -> Result<PluginSet, PublishError> {
        let registry = self.load_registry(config, &tokens)?;
        let notifier = self.load_notifier(config, tokens)?;
        let context = self.load_context(config)?;

        debug!(
            registry = registry.name(),
            dispatch = notifier.name(),
            "plugins loaded"
        );

        Ok(PluginSet {
            registry,
            notifier,
            context,
        })
    }
}
