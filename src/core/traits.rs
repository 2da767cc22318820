//! Core traits and types for workspace publishing
//!
//! This module defines the data that flows through a publish run and the
//! seams to the outside world: the registry that is queried, the trigger
//! that performs the actual publish, and the source of the run context.

use crate::core::error::PublishError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Packages
// ============================================================================

/// A workspace package as handed to the publisher
///
/// The serialized field names follow `package.json` (`version`, `private`)
/// so descriptor files can be produced straight from workspace tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    #[serde(rename = "version")]
    pub local_version: String,
    #[serde(rename = "dir", default)]
    pub directory: String,
    #[serde(rename = "private", default)]
    pub is_private: bool,
}

impl PackageDescriptor {
    pub fn new(
        name: impl Into<String>,
        local_version: impl Into<String>,
        directory: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            local_version: local_version.into(),
            directory: directory.into(),
            is_private: false,
        }
    }

    /// Mark the descriptor as private
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }
}

/// Versions a registry reports for one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishedVersions(BTreeSet<String>);

impl PublishedVersions {
    pub fn contains(&self, version: &str) -> bool {
        self.0.contains(version)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Highest version by SemVer precedence; entries that do not parse are ignored
    pub fn latest(&self) -> Option<semver::Version> {
        self.0
            .iter()
            .filter_map(|v| semver::Version::parse(v).ok())
            .max()
    }

    /// Whether the registry holds a version newer than `local_version`
    pub fn is_ahead_of(&self, local_version: &str) -> bool {
        match (semver::Version::parse(local_version), self.latest()) {
            (Ok(local), Some(latest)) => latest > local,
            _ => false,
        }
    }
}

impl<S: Into<String>> FromIterator<S> for PublishedVersions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Result of looking up one package on a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryQueryResult {
    Found { published_versions: PublishedVersions },
    NotFound,
    UnknownError { code: String, message: String },
}

impl RegistryQueryResult {
    pub fn found<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Found {
            published_versions: versions.into_iter().collect(),
        }
    }

    pub fn unknown(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnknownError {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True when the registry reports `version` as published
    pub fn has_version(&self, version: &str) -> bool {
        matches!(self, Self::Found { published_versions } if published_versions.contains(version))
    }
}

/// A package that needs publishing in this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishCandidate {
    pub descriptor: PackageDescriptor,
    pub published_versions: PublishedVersions,
}

impl PublishCandidate {
    pub fn new(descriptor: PackageDescriptor, published_versions: PublishedVersions) -> Self {
        Self {
            descriptor,
            published_versions,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn local_version(&self) -> &str {
        &self.descriptor.local_version
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Branch and commit of the workspace being released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub branch: String,
    pub commit: String,
}

/// One package entry of the dispatch payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPackage {
    pub package_name: String,
    pub package_dir: String,
    pub local_version: String,
}

/// Everything the external trigger needs to publish the candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub branch: String,
    pub commit: String,
    pub candidates: Vec<PublishCandidate>,
}

impl DispatchRequest {
    pub fn new(context: RunContext, candidates: Vec<PublishCandidate>) -> Self {
        Self {
            branch: context.branch,
            commit: context.commit,
            candidates,
        }
    }

    pub fn packages(&self) -> Vec<DispatchPackage> {
        self.candidates
            .iter()
            .map(|c| DispatchPackage {
                package_name: c.descriptor.name.clone(),
                package_dir: c.descriptor.directory.clone(),
                local_version: c.descriptor.local_version.clone(),
            })
            .collect()
    }

    /// `{ packages, branch, commit }` as sent to the trigger
    pub fn client_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "packages": self.packages(),
            "branch": self.branch,
            "commit": self.commit,
        })
    }

    /// Reject requests without branch or commit
    pub fn ensure_context(&self) -> Result<(), PublishError> {
        let mut missing = Vec::new();
        if self.branch.trim().is_empty() {
            missing.push("branch");
        }
        if self.commit.trim().is_empty() {
            missing.push("commit");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PublishError::Dispatch {
                message: format!("run context is missing: {}", missing.join(", ")),
            })
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Final result for one package of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub name: String,
    pub new_version: String,
    pub published: bool,
}

impl PublishOutcome {
    pub fn published(candidate: &PublishCandidate) -> Self {
        Self {
            name: candidate.name().to_string(),
            new_version: candidate.local_version().to_string(),
            published: true,
        }
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Read-only lookup of a package on a registry
///
/// Implementations never retry and never fail: transport and protocol
/// problems are reported as [`RegistryQueryResult::UnknownError`].
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Client name for logs (e.g., "npm-http", "pnpm")
    fn name(&self) -> &str;

    async fn query(&self, package_name: &str) -> RegistryQueryResult;
}

/// Hands the candidates to whatever performs the actual publish
///
/// A successful return only means the trigger accepted the request.
#[async_trait]
pub trait DispatchNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), PublishError>;
}

/// Source of the branch and commit being released
#[async_trait]
pub trait RunContextProvider: Send + Sync {
    async fn current(&self) -> Result<RunContext, PublishError>;
}
