//! The `Orchestrator` trait: the lifecycle contract shared by
//! [`crate::kafka::KafkaOrchestrator`], [`crate::webhook::WebhookOrchestrator`]
//! and [`crate::scheduler::SchedulerOrchestrator`].

use std::collections::HashMap;

use async_trait::async_trait;
use operion_sources_core::callback::SourceEventCallback;
use operion_sources_core::workflow::Workflow;

use crate::error::OrchestratorError;
use crate::state::OrchestratorState;

#[async_trait]
pub trait Orchestrator: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn state(&self) -> OrchestratorState;

    /// Read `<PROVIDER>_PERSISTENCE_URL`, open persistence, instantiate
    /// runtime objects.
    async fn initialize(&self) -> Result<(), OrchestratorError>;

    /// Upsert a LogicalSource per matching trigger node across `workflows`;
    /// return `{ triggerNodeId → sourceId }`. Idempotent — callable again
    /// from `Initialized` or `Configured`.
    async fn configure(&self, workflows: &[Workflow]) -> Result<HashMap<String, String>, OrchestratorError>;

    /// Validate persistence is reachable and perform any one-time
    /// pre-start registration.
    async fn prepare(&self) -> Result<(), OrchestratorError>;

    /// Store `callback` and start the runtime. Idempotent.
    async fn start(&self, callback: SourceEventCallback) -> Result<(), OrchestratorError>;

    /// Cancel runtime contexts and flush persistence. Idempotent.
    async fn stop(&self) -> Result<(), OrchestratorError>;
}
