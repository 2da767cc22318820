//! Orchestration layer for workspace publishing
//!
//! The gate picks the packages to publish, the orchestrator dispatches them
//! and the confirmation poller waits for the registry to catch up.

pub mod confirmation_poller;
pub mod fan_out;
pub mod orchestrator;
pub mod publish_gate;

pub use confirmation_poller::PublishConfirmationPoller;
pub use fan_out::query_all;
pub use orchestrator::PublishOrchestrator;
pub use publish_gate::PublishGate;
