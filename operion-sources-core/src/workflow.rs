//! Workflow trigger configuration consumed by `Configure`. Workflow
//! storage and execution live in the engine that owns workflows, not
//! here — this crate only needs the shape of a trigger node to derive
//! and upsert the matching LogicalSource, so [`Workflow`] carries
//! nothing beyond that.

use crate::model::ProviderId;

/// A workflow's publication state. Only `Active` (sometimes called
/// "Published") workflows are scanned by `Configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Active,
    Draft,
    Inactive,
}

/// One trigger node inside a workflow. `config` is the
/// provider-specific settings map, passed through verbatim to
/// `BrokerSource::new` / `WebhookSource::new` / `Schedule::new`.
#[derive(Debug, Clone)]
pub struct TriggerNode {
    pub id: String,
    pub provider_id: ProviderId,
    pub source_id: Option<String>,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: String,
    pub status: WorkflowStatus,
    pub trigger_nodes: Vec<TriggerNode>,
}

impl Workflow {
    /// Trigger nodes on this workflow that belong to `provider`, only if
    /// the workflow itself is `Active`.
    pub fn active_triggers_for(&self, provider: ProviderId) -> impl Iterator<Item = &TriggerNode> {
        let matches = self.status == WorkflowStatus::Active;
        self.trigger_nodes
            .iter()
            .filter(move |t| matches && t.provider_id == provider)
    }
}
