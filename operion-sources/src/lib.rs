//! Provider orchestrators for operion event-source providers.
//!
//! One [`Orchestrator`] implementation per provider — [`KafkaOrchestrator`],
//! [`WebhookOrchestrator`], [`SchedulerOrchestrator`] — each walking the
//! same `Uninitialized → Initialized → Configured → Prepared → Running →
//! Stopped` state machine and wiring together the matching persistence
//! adapter (`operion-sources-file` / `operion-sources-sql`) and runtime
//! (`operion-sources-kafka` / `operion-sources-webhook` /
//! `operion-sources-scheduler`).

pub mod error;
pub mod kafka;
pub mod orchestrator;
pub mod scheduler;
pub mod state;
pub mod webhook;

pub use error::OrchestratorError;
pub use kafka::KafkaOrchestrator;
pub use orchestrator::Orchestrator;
pub use scheduler::SchedulerOrchestrator;
pub use state::OrchestratorState;
pub use webhook::WebhookOrchestrator;
