//! Configuration file loader for workspace-publisher
//!
//! Builds a [`PublisherConfig`] from layered sources. Environment values are
//! read from an explicit map so callers (and tests) control what is visible.

use super::config::*;
use crate::core::error::PublishError;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".publish-config.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Values given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub registry_url: Option<String>,
    pub registry_client: Option<RegistryClientKind>,
    pub max_attempts: Option<u32>,
    pub delay_ms: Option<u64>,
    pub dispatch_target: Option<DispatchTarget>,
    pub skip: Option<Vec<String>>,
}

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project path to look for `.publish-config.yaml` in
    pub project_path: PathBuf,

    /// Explicit config file; must exist when given
    pub config_file: Option<PathBuf>,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// CLI arguments
    pub overrides: ConfigOverrides,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Config file (explicit path or `<project>/.publish-config.yaml`)
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublisherConfig, PublishError> {
        let mut config = match &options.config_file {
            Some(path) => Self::load_config_file(path)
                .await?
                .ok_or_else(|| {
                    PublishError::Config(format!("config file not found: {}", path.display()))
                })?,
            None => Self::load_config_file(&options.project_path.join(CONFIG_FILENAME))
                .await?
                .unwrap_or_default(),
        };

        Self::apply_env(&mut config, &options.env)?;
        Self::apply_overrides(&mut config, options.overrides);
        Self::expand_env_vars(&mut config, &options.env)?;
        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a YAML file; `None` when it does not exist
    async fn load_config_file(file_path: &Path) -> Result<Option<PublisherConfig>, PublishError> {
        if !file_path.exists() {
            return Ok(None);
        }

        debug!(path = %file_path.display(), "loading config file");
        let content = fs::read_to_string(file_path)
            .await
            .map_err(|e| PublishError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content).map(Some)
    }

    /// Parse a YAML document; missing sections take their defaults
    pub fn from_yaml(content: &str) -> Result<PublisherConfig, PublishError> {
        if content.trim().is_empty() {
            return Ok(PublisherConfig::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| PublishError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Apply environment variables
    fn apply_env(
        config: &mut PublisherConfig,
        env: &HashMap<String, String>,
    ) -> Result<(), PublishError> {
        let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(url) = get("PUBLISH_REGISTRY_URL") {
            config.registry.url = url.to_string();
        }
        if let Some(client) = get("PUBLISH_REGISTRY_CLIENT") {
            config.registry.client = RegistryClientKind::parse(client).ok_or_else(|| {
                PublishError::Config(format!(
                    "PUBLISH_REGISTRY_CLIENT: unknown client '{}'",
                    client
                ))
            })?;
        }
        if let Some(value) = get("PUBLISH_MAX_ATTEMPTS") {
            config.poll.max_attempts = Self::parse_number("PUBLISH_MAX_ATTEMPTS", value)?;
        }
        if let Some(value) = get("PUBLISH_POLL_DELAY_MS") {
            config.poll.delay_ms = Self::parse_number("PUBLISH_POLL_DELAY_MS", value)?;
        }
        if let Some(target) = get("DISPATCH_TARGET") {
            config.dispatch.target = DispatchTarget::parse(target).ok_or_else(|| {
                PublishError::Config(format!("DISPATCH_TARGET: unknown target '{}'", target))
            })?;
        }
        if let Some(url) = get("DISPATCH_API_URL") {
            config.dispatch.api_url = url.to_string();
        }
        if let Some(owner) = get("DISPATCH_REPO_OWNER") {
            config.dispatch.repo_owner = Some(owner.to_string());
        }
        if let Some(name) = get("DISPATCH_REPO_NAME") {
            config.dispatch.repo_name = Some(name.to_string());
        }
        if config.dispatch.output_file.is_none()
            && let Some(path) = get("GITHUB_OUTPUT")
        {
            config.dispatch.output_file = Some(PathBuf::from(path));
        }

        Ok(())
    }

    fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, PublishError> {
        value.parse().map_err(|_| {
            PublishError::Config(format!("{}: '{}' is not a valid number", key, value))
        })
    }

    /// Apply command-line overrides
    fn apply_overrides(config: &mut PublisherConfig, overrides: ConfigOverrides) {
        if let Some(url) = overrides.registry_url {
            config.registry.url = url;
        }
        if let Some(client) = overrides.registry_client {
            config.registry.client = client;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            config.poll.max_attempts = max_attempts;
        }
        if let Some(delay_ms) = overrides.delay_ms {
            config.poll.delay_ms = delay_ms;
        }
        if let Some(target) = overrides.dispatch_target {
            config.dispatch.target = target;
        }
        if let Some(skip) = overrides.skip {
            config.skip = skip;
        }
    }

    /// Expand `${VAR}` references in string settings
    fn expand_env_vars(
        config: &mut PublisherConfig,
        env: &HashMap<String, String>,
    ) -> Result<(), PublishError> {
        config.registry.url = Self::expand_string(&config.registry.url, env)?;
        config.dispatch.api_url = Self::expand_string(&config.dispatch.api_url, env)?;
        if let Some(owner) = &config.dispatch.repo_owner {
            config.dispatch.repo_owner = Some(Self::expand_string(owner, env)?);
        }
        if let Some(name) = &config.dispatch.repo_name {
            config.dispatch.repo_name = Some(Self::expand_string(name, env)?);
        }
        Ok(())
    }

    /// Expand environment variables in a single string
    fn expand_string(input: &str, env: &HashMap<String, String>) -> Result<String, PublishError> {
        let env_var_regex = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| PublishError::Config(format!("invalid variable pattern: {}", e)))?;

        let mut result = input.to_string();
        for cap in env_var_regex.captures_iter(input) {
            let var_name = &cap[1];
            let value = env.get(var_name).ok_or_else(|| {
                PublishError::Config(format!("environment variable {} is not set", var_name))
            })?;
            result = result.replace(&format!("${{{}}}", var_name), value);
        }

        Ok(result)
    }

    /// Validate configuration
    pub fn validate(config: &PublisherConfig) -> Result<(), PublishError> {
        let mut errors = Vec::new();

        if config.registry.url.trim().is_empty() {
            errors.push("registry.url must not be empty");
        }
        if config.registry.max_concurrency == 0 {
            errors.push("registry.maxConcurrency must be at least 1");
        }
        if config.registry.timeout_secs == 0 {
            errors.push("registry.timeoutSecs must be at least 1");
        }
        if config.dispatch.event_type.trim().is_empty() {
            errors.push("dispatch.eventType must not be empty");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PublishError::Config(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_load_defaults_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::load(ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(config, PublisherConfig::default());
    }

    #[tokio::test]
    async fn test_priority_file_env_cli() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "poll:\n  maxAttempts: 3\n  delayMs: 100\nregistry:\n  url: https://npm.pkg.github.com\n",
        )
        .unwrap();

        let config = ConfigLoader::load(ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            config_file: None,
            env: env(&[("PUBLISH_MAX_ATTEMPTS", "5"), ("DISPATCH_REPO_OWNER", "acme")]),
            overrides: ConfigOverrides {
                delay_ms: Some(50),
                ..Default::default()
            },
        })
        .await
        .unwrap();

        assert_eq!(config.registry.url, "https://npm.pkg.github.com");
        assert_eq!(config.poll.max_attempts, 5);
        assert_eq!(config.poll.delay_ms, 50);
        assert_eq!(config.dispatch.repo_owner.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_explicit_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = ConfigLoader::load(ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            config_file: Some(temp_dir.path().join("missing.yaml")),
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(PublishError::Config(msg)) if msg.contains("missing.yaml")));
    }

    #[tokio::test]
    async fn test_invalid_number_in_env() {
        let result = ConfigLoader::load(ConfigLoadOptions {
            env: env(&[("PUBLISH_POLL_DELAY_MS", "soon")]),
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(PublishError::Config(msg)) if msg.contains("PUBLISH_POLL_DELAY_MS")));
    }

    #[test]
    fn test_unknown_client_and_target_in_env() {
        let mut config = PublisherConfig::default();

        let err =
            ConfigLoader::apply_env(&mut config, &env(&[("PUBLISH_REGISTRY_CLIENT", "yarn")]))
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "設定エラー: PUBLISH_REGISTRY_CLIENT: unknown client 'yarn'"
        );

        let err = ConfigLoader::apply_env(&mut config, &env(&[("DISPATCH_TARGET", "gitlab")]))
            .unwrap_err();
        assert!(err.to_string().contains("DISPATCH_TARGET: unknown target 'gitlab'"));
    }

    #[test]
    fn test_github_output_fills_output_file() {
        let mut config = PublisherConfig::default();
        ConfigLoader::apply_env(&mut config, &env(&[("GITHUB_OUTPUT", "/tmp/out")])).unwrap();
        assert_eq!(config.dispatch.output_file, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_expand_string() {
        let vars = env(&[("GITHUB_REPOSITORY_OWNER", "acme")]);
        let result = ConfigLoader::expand_string("${GITHUB_REPOSITORY_OWNER}-releases", &vars).unwrap();
        assert_eq!(result, "acme-releases");
    }

    #[test]
    fn test_expand_string_missing_variable() {
        let result = ConfigLoader::expand_string("${NOT_SET}", &HashMap::new());
        assert!(matches!(result, Err(PublishError::Config(msg)) if msg.contains("NOT_SET")));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = PublisherConfig::default();
        config.registry.max_concurrency = 0;
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(err.to_string().contains("maxConcurrency"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ConfigLoader::from_yaml("  \n").unwrap(), PublisherConfig::default());
    }
}
