//! Publish Confirmation Poller - waits until dispatched versions show up
//!
//! Registries are eventually consistent, so a successful dispatch says
//! nothing about when (or whether) the versions become visible. The poller
//! re-queries the unconfirmed candidates with a fixed delay until all of
//! them are found, the attempt budget runs out, a lookup fails or the run
//! is cancelled.

use crate::core::error::{PublishError, RegistryFailure};
use crate::core::retry::{CancellationToken, PollOptions};
use crate::core::state_machine::{PollPhase, PollState};
use crate::core::traits::{PublishCandidate, RegistryClient, RegistryQueryResult};
use crate::orchestration::fan_out::query_all;
use crate::orchestration::publish_gate::DEFAULT_MAX_CONCURRENCY;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Phase name reported when the confirmation loop is cancelled
pub const CONFIRMATION_PHASE: &str = "公開確認";

pub struct PublishConfirmationPoller {
    registry: Arc<dyn RegistryClient>,
    max_concurrency: usize,
}

impl PublishConfirmationPoller {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self {
            registry,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Poll until every candidate's local version is on the registry
    ///
    /// # Errors
    ///
    /// - `PublishError::UnknownRegistry` - Lookups failed; every failed package is
    ///   listed and no further queries are made
    /// - `PublishError::PublishTimeout` - Attempts exhausted; lists the unconfirmed candidates
    /// - `PublishError::Cancelled` - `cancel` fired while querying or waiting
    pub async fn await_publication(
        &self,
        candidates: &[PublishCandidate],
        options: &PollOptions,
        cancel: &CancellationToken,
    ) -> Result<(), PublishError> {
        let max_attempts = options.effective_max_attempts();
        let mut state = PollState::new(candidates.to_vec());

        let outcome = loop {
            if state.remaining().is_empty() {
                state.transition(PollPhase::AllConfirmed);
                break Ok(());
            }

            let names = state.remaining_names();
            debug!(attempt = state.attempt(), remaining = ?names, "checking publication");

            let round = query_all(self.registry.as_ref(), &names, self.max_concurrency);
            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                results = round => Some(results),
            };
            let Some(results) = results else {
                state.transition(PollPhase::Cancelled);
                break Err(Self::cancelled());
            };

            let mut confirmed = HashSet::new();
            let mut failures = Vec::new();
            for (candidate, result) in state.remaining().iter().zip(results) {
                match result {
                    RegistryQueryResult::UnknownError { code, message } => {
                        failures.push(RegistryFailure {
                            package: candidate.name().to_string(),
                            code,
                            message,
                        });
                    }
                    result if result.has_version(candidate.local_version()) => {
                        info!(
                            package = candidate.name(),
                            version = candidate.local_version(),
                            attempt = state.attempt(),
                            "publication confirmed"
                        );
                        confirmed.insert(candidate.name().to_string());
                    }
                    _ => {}
                }
            }

            if let Some(error) = PublishError::from_registry_failures(failures) {
                state.transition(PollPhase::Aborted);
                break Err(error);
            }

            state.confirm(&confirmed);
            if state.remaining().is_empty() {
                state.transition(PollPhase::AllConfirmed);
                break Ok(());
            }

            if state.attempt() >= max_attempts {
                warn!(
                    attempts = state.attempt(),
                    remaining = ?state.remaining_names(),
                    "publication not confirmed, giving up"
                );
                state.transition(PollPhase::TimedOut);
                break Err(PublishError::PublishTimeout {
                    attempts: state.attempt(),
                    still_unpublished: state.remaining().to_vec(),
                });
            }

            info!(
                attempt = state.attempt(),
                max_attempts,
                remaining = state.remaining().len(),
                delay_ms = options.delay.as_millis() as u64,
                "waiting for the registry"
            );
            if !options.wait_between_attempts(cancel).await {
                state.transition(PollPhase::Cancelled);
                break Err(Self::cancelled());
            }
            state.advance();
        };

        debug!(
            phase = ?state.phase(),
            elapsed_ms = state.elapsed_ms(),
            transitions = state.transitions().len(),
            history = %state.history(),
            "confirmation finished"
        );
        outcome
    }

    fn cancelled() -> PublishError {
        PublishError::Cancelled {
            phase: CONFIRMATION_PHASE.to_string(),
        }
    }
}
