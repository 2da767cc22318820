//! In-memory collaborators for tests
//!
//! `ScriptedRegistry`, `RecordingNotifier` and `StaticRunContext` satisfy
//! the collaborator traits without network, git or package manager access.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::PublishError;
use crate::core::traits::*;

// ---------------------------------------------------------------------------
// ScriptedRegistry
// ---------------------------------------------------------------------------

/// Registry answering from a per-package script
///
/// Each query takes the next scripted result; the last one repeats forever.
/// Packages without a script are `NotFound`. A query is recorded when it
/// starts, so an abandoned in-flight query still counts.
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    scripts: Mutex<HashMap<String, VecDeque<RegistryQueryResult>>>,
    queries: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script<I>(self, package_name: &str, results: I) -> Self
    where
        I: IntoIterator<Item = RegistryQueryResult>,
    {
        self.scripts
            .lock()
            .unwrap()
            .insert(package_name.to_string(), results.into_iter().collect());
        self
    }

    /// Every query takes `latency` (tokio time) before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn query_count(&self, package_name: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|name| *name == package_name)
            .count()
    }

    pub fn total_queries(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Package names in query order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn query(&self, package_name: &str) -> RegistryQueryResult {
        self.queries.lock().unwrap().push(package_name.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(package_name) {
            Some(script) if script.len() > 1 => script
                .pop_front()
                .unwrap_or(RegistryQueryResult::NotFound),
            Some(script) => script
                .front()
                .cloned()
                .unwrap_or(RegistryQueryResult::NotFound),
            None => RegistryQueryResult::NotFound,
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Notifier that records every request, optionally failing each one
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    requests: Mutex<Vec<DispatchRequest>>,
    failure: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dispatch is recorded, then fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DispatchNotifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), PublishError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.failure {
            Some(message) => Err(PublishError::Dispatch {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticRunContext
// ---------------------------------------------------------------------------

/// Fixed branch and commit; counts lookups
#[derive(Debug)]
pub struct StaticRunContext {
    context: RunContext,
    lookups: Mutex<usize>,
}

impl StaticRunContext {
    pub fn new(branch: &str, commit: &str) -> Self {
        Self {
            context: RunContext {
                branch: branch.to_string(),
                commit: commit.to_string(),
            },
            lookups: Mutex::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl RunContextProvider for StaticRunContext {
    async fn current(&self) -> Result<RunContext, PublishError> {
        *self.lookups.lock().unwrap() += 1;
        Ok(self.context.clone())
    }
}
