//! Configuration structures and types for workspace-publisher
//!
//! The whole run is driven by one [`PublisherConfig`] value handed to the
//! orchestrator; nothing below reads the process environment on its own.

use crate::core::retry::{DEFAULT_DELAY_MS, DEFAULT_MAX_ATTEMPTS, PollOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Public npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// GitHub REST API
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// `event_type` of the repository dispatch
pub const DEFAULT_EVENT_TYPE: &str = "publish_packages";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PublisherConfig {
    /// Registry lookup settings
    pub registry: RegistryConfig,

    /// Confirmation polling settings
    pub poll: PollConfig,

    /// Publish trigger settings
    pub dispatch: DispatchConfig,

    /// Package names never considered for publishing
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skip: Vec<String>,
}

/// How the registry is queried
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryClientKind {
    /// Direct HTTP request for the package document
    #[default]
    Http,
    /// `pnpm info <name> --json`
    Pnpm,
    /// `npm info <name> --json`
    Npm,
}

impl RegistryClientKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "pnpm" => Some(Self::Pnpm),
            "npm" => Some(Self::Npm),
            _ => None,
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Registry base URL (default: public npm registry)
    pub url: String,

    /// Lookup strategy (default: http)
    pub client: RegistryClientKind,

    /// Per-request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Maximum concurrent lookups (default: 8)
    pub max_concurrency: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            client: RegistryClientKind::default(),
            timeout_secs: 30,
            max_concurrency: 8,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Confirmation polling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PollConfig {
    /// Maximum query rounds (default: 10)
    pub max_attempts: u32,

    /// Delay between rounds in milliseconds (default: 15000)
    pub delay_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl PollConfig {
    pub fn options(&self) -> PollOptions {
        PollOptions::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

/// Where the publish request is sent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchTarget {
    /// GitHub `repository_dispatch` event
    #[default]
    Github,
    /// Workflow step output consumed by a later step
    StepOutput,
}

impl DispatchTarget {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "github" => Some(Self::Github),
            "step-output" | "step_output" => Some(Self::StepOutput),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::StepOutput => "step-output",
        }
    }
}

/// Publish trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Trigger implementation (default: github)
    pub target: DispatchTarget,

    /// GitHub API base URL
    pub api_url: String,

    /// Repository dispatch event type
    pub event_type: String,

    /// Owner of the repository running the publish workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_owner: Option<String>,

    /// Name of the repository running the publish workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,

    /// Step output file (defaults to `GITHUB_OUTPUT`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            target: DispatchTarget::default(),
            api_url: DEFAULT_API_URL.to_string(),
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            repo_owner: None,
            repo_name: None,
            output_file: None,
        }
    }
}
