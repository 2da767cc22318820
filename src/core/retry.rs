//! Poll scheduling and cancellation
//!
//! Confirmation polling uses a fixed delay between attempts and a bounded
//! attempt count. The only suspension point of a run is the wait between
//! attempts, and it can be interrupted through a [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Default number of confirmation attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay between confirmation attempts in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 15_000;

/// Options for confirmation polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Maximum number of query rounds
    pub max_attempts: u32,
    /// Delay between two rounds
    pub delay: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

impl PollOptions {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Attempt budget actually used; at least one round always runs
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Sleep for `delay` unless `cancel` fires first
    ///
    /// Returns `false` when the wait was cancelled.
    pub async fn wait_between_attempts(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.delay) => true,
            _ = cancel.cancelled() => false,
        }
    }
}

/// Cloneable cancellation signal shared between a run and its caller
///
/// # Examples
///
/// ```
/// use workspace_publisher::core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let caller = token.clone();
/// caller.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as this token, so this is unreachable in practice.
            std::future::pending::<()>().await;
        }
    }
}
