//! Publish Orchestrator - one publish run from descriptors to outcomes
//!
//! Classify, dispatch once, then wait for the registry to confirm. Any
//! error ends the run; there is no partial outcome list.

use crate::core::config::PublisherConfig;
use crate::core::error::PublishError;
use crate::core::retry::{CancellationToken, PollOptions};
use crate::core::traits::{
    DispatchNotifier, DispatchRequest, PackageDescriptor, PublishOutcome, RegistryClient,
    RunContextProvider,
};
use crate::orchestration::confirmation_poller::PublishConfirmationPoller;
use crate::orchestration::publish_gate::PublishGate;
use crate::plugins::plugin_loader::PluginSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Phase name reported when classification is cancelled
pub const CLASSIFICATION_PHASE: &str = "公開対象の判定";

/// Phase name reported when cancelled before the dispatch went out
pub const DISPATCH_PHASE: &str = "公開トリガーの送信";

pub struct PublishOrchestrator {
    gate: PublishGate,
    notifier: Arc<dyn DispatchNotifier>,
    context: Arc<dyn RunContextProvider>,
    poller: PublishConfirmationPoller,
    poll_options: PollOptions,
}

impl PublishOrchestrator {
    pub fn new(
        config: &PublisherConfig,
        registry: Arc<dyn RegistryClient>,
        notifier: Arc<dyn DispatchNotifier>,
        context: Arc<dyn RunContextProvider>,
    ) -> Self {
        let max_concurrency = config.registry.max_concurrency;

        Self {
            gate: PublishGate::new(Arc::clone(&registry))
                .with_skip_list(config.skip.iter().cloned())
                .with_max_concurrency(max_concurrency),
            notifier,
            context,
            poller: PublishConfirmationPoller::new(registry).with_max_concurrency(max_concurrency),
            poll_options: config.poll.options(),
        }
    }

    pub fn from_plugins(config: &PublisherConfig, plugins: PluginSet) -> Self {
        Self::new(config, plugins.registry, plugins.notifier, plugins.context)
    }

    /// Run without external cancellation
    pub async fn run(
        &self,
        descriptors: &[PackageDescriptor],
    ) -> Result<Vec<PublishOutcome>, PublishError> {
        self.run_with_cancel(descriptors, &CancellationToken::new())
            .await
    }

    /// Run until done or until `cancel` fires
    ///
    /// Returns an empty list when nothing needs publishing; in that case the
    /// run context is not resolved and nothing is dispatched. Cancellation
    /// never interrupts a dispatch already in flight.
    #[instrument(
        name = "publish_run",
        skip_all,
        fields(run_id = %Uuid::new_v4(), packages = descriptors.len())
    )]
    pub async fn run_with_cancel(
        &self,
        descriptors: &[PackageDescriptor],
        cancel: &CancellationToken,
    ) -> Result<Vec<PublishOutcome>, PublishError> {
        let candidates = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            candidates = self.gate.classify(descriptors) => Some(candidates),
        }
        .ok_or_else(|| PublishError::Cancelled {
            phase: CLASSIFICATION_PHASE.to_string(),
        })??;

        if candidates.is_empty() {
            info!("no new versions to publish");
            return Ok(Vec::new());
        }

        let run_context = self.context.current().await?;
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled {
                phase: DISPATCH_PHASE.to_string(),
            });
        }

        let request = DispatchRequest::new(run_context, candidates);
        info!(
            notifier = self.notifier.name(),
            branch = %request.branch,
            commit = %request.commit,
            packages = request.candidates.len(),
            "dispatching publish request"
        );
        self.notifier.dispatch(&request).await?;

        self.poller
            .await_publication(&request.candidates, &self.poll_options, cancel)
            .await?;

        Ok(request
            .candidates
            .iter()
            .map(PublishOutcome::published)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::RegistryQueryResult;
    use crate::fakes::{RecordingNotifier, ScriptedRegistry, StaticRunContext};

    fn fast_config() -> PublisherConfig {
        let mut config = PublisherConfig::default();
        config.poll.max_attempts = 3;
        config.poll.delay_ms = 10;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_publishes_and_confirms() {
        let registry = Arc::new(ScriptedRegistry::new().script(
            "a",
            [RegistryQueryResult::NotFound, RegistryQueryResult::found(["1.0.0"])],
        ));
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = PublishOrchestrator::new(
            &fast_config(),
            registry.clone(),
            notifier.clone(),
            Arc::new(StaticRunContext::new("main", "0123abcd")),
        );

        let outcomes = orchestrator
            .run(&[PackageDescriptor::new("a", "1.0.0", "packages/a")])
            .await
            .unwrap();

        assert_eq!(
            outcomes,
            vec![PublishOutcome {
                name: "a".to_string(),
                new_version: "1.0.0".to_string(),
                published: true,
            }]
        );
        let requests = notifier.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].branch, "main");
        assert_eq!(requests[0].commit, "0123abcd");
    }

    #[tokio::test]
    async fn test_nothing_to_publish_skips_context_and_dispatch() {
        let registry = Arc::new(
            ScriptedRegistry::new().script("a", [RegistryQueryResult::found(["1.0.0"])]),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let context = Arc::new(StaticRunContext::new("main", "0123abcd"));
        let orchestrator = PublishOrchestrator::new(
            &fast_config(),
            registry,
            notifier.clone(),
            context.clone(),
        );

        let outcomes = orchestrator
            .run(&[PackageDescriptor::new("a", "1.0.0", "packages/a")])
            .await
            .unwrap();

        assert!(outcomes.is_empty());
        assert!(notifier.requests().is_empty());
        assert_eq!(context.lookups(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_failure_stops_the_run() {
        let registry = Arc::new(ScriptedRegistry::new());
        let notifier = Arc::new(RecordingNotifier::failing("422 Unprocessable Entity"));
        let orchestrator = PublishOrchestrator::new(
            &fast_config(),
            registry.clone(),
            notifier.clone(),
            Arc::new(StaticRunContext::new("main", "0123abcd")),
        );

        let err = orchestrator
            .run(&[PackageDescriptor::new("a", "1.0.0", "packages/a")])
            .await
            .unwrap_err();

        assert_eq!(err.code(), "DISPATCH_ERROR");
        assert_eq!(notifier.requests().len(), 1);
        // Classification only; no confirmation round
        assert_eq!(registry.query_count("a"), 1);
    }

    #[tokio::test]
    async fn test_skip_list_from_config() {
        let registry = Arc::new(ScriptedRegistry::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let mut config = fast_config();
        config.skip = vec!["a".to_string()];
        let orchestrator = PublishOrchestrator::new(
            &config,
            registry.clone(),
            notifier.clone(),
            Arc::new(StaticRunContext::new("main", "0123abcd")),
        );

        let outcomes = orchestrator
            .run(&[PackageDescriptor::new("a", "1.0.0", "packages/a")])
            .await
            .unwrap();

        assert!(outcomes.is_empty());
        assert_eq!(registry.total_queries(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let registry = Arc::new(ScriptedRegistry::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = PublishOrchestrator::new(
            &fast_config(),
            registry.clone(),
            notifier.clone(),
            Arc::new(StaticRunContext::new("main", "0123abcd")),
        );
        let token = CancellationToken::new();
        token.cancel();

        let err = orchestrator
            .run_with_cancel(&[PackageDescriptor::new("a", "1.0.0", "packages/a")], &token)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Cancelled { .. }));
        assert!(notifier.requests().is_empty());
        assert_eq!(registry.total_queries(), 0);
    }
}
