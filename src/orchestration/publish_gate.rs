//! Publish Gate - decides which workspace packages need publishing
//!
//! A package is a candidate when the registry does not know it at all, or
//! knows it but not at the local version. Private and skipped packages are
//! dropped before any lookup.

use crate::core::error::{PublishError, RegistryFailure};
use crate::core::traits::{
    PackageDescriptor, PublishCandidate, PublishedVersions, RegistryClient, RegistryQueryResult,
};
use crate::orchestration::fan_out::query_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of concurrent registry lookups
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

pub struct PublishGate {
    registry: Arc<dyn RegistryClient>,
    skip: HashSet<String>,
    max_concurrency: usize,
}

impl PublishGate {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self {
            registry,
            skip: HashSet::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Package names never considered for publishing
    pub fn with_skip_list<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    fn is_eligible(&self, descriptor: &PackageDescriptor) -> bool {
        if descriptor.is_private {
            debug!(package = %descriptor.name, "private package, not queried");
            return false;
        }
        if self.skip.contains(&descriptor.name) {
            info!(package = %descriptor.name, "package is in the skip list");
            return false;
        }
        true
    }

    /// Classify descriptors into publish candidates, keeping input order
    ///
    /// # Errors
    ///
    /// `PublishError::UnknownRegistry` when any lookup failed with anything
    /// other than "not found"; every failed package is listed, in input order.
    pub async fn classify(
        &self,
        descriptors: &[PackageDescriptor],
    ) -> Result<Vec<PublishCandidate>, PublishError> {
        let eligible: Vec<&PackageDescriptor> =
            descriptors.iter().filter(|d| self.is_eligible(d)).collect();
        let names: Vec<String> = eligible.iter().map(|d| d.name.clone()).collect();

        debug!(
            registry = self.registry.name(),
            total = descriptors.len(),
            queried = names.len(),
            "checking registry"
        );
        let results = query_all(self.registry.as_ref(), &names, self.max_concurrency).await;

        let failures: Vec<RegistryFailure> = eligible
            .iter()
            .zip(&results)
            .filter_map(|(descriptor, result)| match result {
                RegistryQueryResult::UnknownError { code, message } => Some(RegistryFailure {
                    package: descriptor.name.clone(),
                    code: code.clone(),
                    message: message.clone(),
                }),
                _ => None,
            })
            .collect();
        if let Some(error) = PublishError::from_registry_failures(failures) {
            return Err(error);
        }

        let mut candidates = Vec::new();
        for (descriptor, result) in eligible.into_iter().zip(results) {
            let published_versions = match result {
                RegistryQueryResult::UnknownError { .. } => continue,
                RegistryQueryResult::NotFound => {
                    info!(
                        package = %descriptor.name,
                        version = %descriptor.local_version,
                        "package is not on the registry yet"
                    );
                    PublishedVersions::default()
                }
                RegistryQueryResult::Found { published_versions } => {
                    if published_versions.contains(&descriptor.local_version) {
                        warn!(
                            package = %descriptor.name,
                            version = %descriptor.local_version,
                            "version already published, skipping"
                        );
                        continue;
                    }

                    if published_versions.is_ahead_of(&descriptor.local_version) {
                        warn!(
                            package = %descriptor.name,
                            local = %descriptor.local_version,
                            latest = ?published_versions.latest().map(|v| v.to_string()),
                            "local version is behind the registry"
                        );
                    }

                    info!(
                        package = %descriptor.name,
                        version = %descriptor.local_version,
                        published = published_versions.len(),
                        "new version to publish"
                    );
                    published_versions
                }
            };

            candidates.push(PublishCandidate::new(descriptor.clone(), published_versions));
        }

        Ok(candidates)
    }
}
