//! State machine for the publish confirmation loop
//!
//! [`PollState`] is owned by a single poller call and dropped when the loop
//! exits. It records every phase change so a finished run can be reported.

use crate::core::traits::PublishCandidate;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Phase of the confirmation loop
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollPhase {
    Polling,
    AllConfirmed,
    TimedOut,
    Aborted,
    Cancelled,
}

impl PollPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Polling)
    }
}

/// Phase change
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhaseTransition {
    pub from: PollPhase,
    pub to: PollPhase,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of one confirmation run
#[derive(Debug)]
pub struct PollState {
    remaining: Vec<PublishCandidate>,
    attempt: u32,
    phase: PollPhase,
    started_at: DateTime<Utc>,
    transitions: Vec<PhaseTransition>,
}

impl PollState {
    /// Start in `Polling` at attempt 1 with every candidate unconfirmed
    pub fn new(candidates: Vec<PublishCandidate>) -> Self {
        Self {
            remaining: candidates,
            attempt: 1,
            phase: PollPhase::Polling,
            started_at: Utc::now(),
            transitions: Vec::new(),
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Candidates not yet confirmed, in their original order
    pub fn remaining(&self) -> &[PublishCandidate] {
        &self.remaining
    }

    pub fn remaining_names(&self) -> Vec<String> {
        self.remaining.iter().map(|c| c.name().to_string()).collect()
    }

    /// Drop confirmed candidates; returns how many were removed
    pub fn confirm(&mut self, confirmed: &HashSet<String>) -> usize {
        let before = self.remaining.len();
        self.remaining.retain(|c| !confirmed.contains(c.name()));
        before - self.remaining.len()
    }

    /// Move on to the next attempt; no-op once terminal
    pub fn advance(&mut self) {
        if !self.phase.is_terminal() {
            self.attempt += 1;
        }
    }

    /// Record a phase change
    pub fn transition(&mut self, to: PollPhase) {
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            attempt: self.attempt,
            timestamp: Utc::now(),
        });
        self.phase = to;
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// Milliseconds since the state was created
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    /// Transition history as human-readable string
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                format!(
                    "{}: {:?} → {:?} (attempt {})",
                    t.timestamp.to_rfc3339(),
                    t.from,
                    t.to,
                    t.attempt
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::{PackageDescriptor, PublishedVersions};

    fn candidates(names: &[&str]) -> Vec<PublishCandidate> {
        names
            .iter()
            .map(|n| {
                PublishCandidate::new(
                    PackageDescriptor::new(*n, "1.0.0", *n),
                    PublishedVersions::default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_new_state() {
        let state = PollState::new(candidates(&["a", "b"]));

        assert_eq!(state.attempt(), 1);
        assert_eq!(state.phase(), PollPhase::Polling);
        assert_eq!(state.remaining_names(), vec!["a", "b"]);
        assert!(state.transitions().is_empty());
    }

    #[test]
    fn test_confirm_keeps_order_of_the_rest() {
        let mut state = PollState::new(candidates(&["a", "b", "c"]));
        let confirmed: HashSet<String> = ["b".to_string()].into_iter().collect();

        assert_eq!(state.confirm(&confirmed), 1);
        assert_eq!(state.remaining_names(), vec!["a", "c"]);
        assert_eq!(state.confirm(&confirmed), 0);
    }

    #[test]
    fn test_advance_stops_after_terminal_phase() {
        let mut state = PollState::new(candidates(&["a"]));
        state.advance();
        assert_eq!(state.attempt(), 2);

        state.transition(PollPhase::TimedOut);
        state.advance();
        assert_eq!(state.attempt(), 2);
        assert!(state.phase().is_terminal());
    }

    #[test]
    fn test_history() {
        let mut state = PollState::new(candidates(&["a"]));
        state.advance();
        state.transition(PollPhase::AllConfirmed);

        let history = state.history();
        assert!(history.contains("Polling → AllConfirmed (attempt 2)"));
        assert_eq!(state.transitions()[0].attempt, 2);
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&PollPhase::AllConfirmed).unwrap();
        assert_eq!(json, r#""ALL_CONFIRMED""#);
    }
}
