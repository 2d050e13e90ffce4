//! Scheduler provider orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use operion_sources_core::callback::SourceEventCallback;
use operion_sources_core::env::{file_base_path, persistence_scheme, required_var, PersistenceScheme};
use operion_sources_core::model::{ProviderId, Schedule};
use operion_sources_core::repository::ScheduleRepository;
use operion_sources_core::workflow::Workflow;
use operion_sources_file::FileScheduleRepository;
use operion_sources_scheduler::SchedulePoller;
use operion_sources_sql::SqlScheduleRepository;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;
use crate::state::{require, require_one_of, OrchestratorState};

const PERSISTENCE_URL_VAR: &str = "SCHEDULER_PERSISTENCE_URL";
const FILE_NAME: &str = "schedules.json";

pub struct SchedulerOrchestrator {
    state: RwLock<OrchestratorState>,
    repository: RwLock<Option<Arc<dyn ScheduleRepository>>>,
    poller: RwLock<Option<Arc<SchedulePoller>>>,
}

impl SchedulerOrchestrator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(OrchestratorState::Uninitialized),
            repository: RwLock::new(None),
            poller: RwLock::new(None),
        }
    }

    async fn repository(&self) -> Arc<dyn ScheduleRepository> {
        self.repository
            .read()
            .await
            .clone()
            .expect("repository set by initialize() before this call")
    }
}

impl Default for SchedulerOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

async fn open_repository(url: &str) -> Result<Arc<dyn ScheduleRepository>, OrchestratorError> {
    match persistence_scheme(PERSISTENCE_URL_VAR, url)? {
        PersistenceScheme::File => {
            let path = file_base_path(url).join(FILE_NAME);
            Ok(Arc::new(FileScheduleRepository::open(path).await?))
        }
        PersistenceScheme::Postgres | PersistenceScheme::MySql | PersistenceScheme::Sqlite => {
            let (pool, dialect) = operion_sources_sql::connect(url).await?;
            Ok(Arc::new(SqlScheduleRepository::new(pool, dialect)))
        }
    }
}

#[async_trait]
impl Orchestrator for SchedulerOrchestrator {
    fn provider_name(&self) -> &'static str {
        "scheduler"
    }

    async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    async fn initialize(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().await;
        require(*state, OrchestratorState::Uninitialized, "Initialize")?;

        let url = required_var(PERSISTENCE_URL_VAR)?;
        let repository = open_repository(&url).await?;
        *self.repository.write().await = Some(repository);
        *state = OrchestratorState::Initialized;
        Ok(())
    }

    async fn configure(&self, workflows: &[Workflow]) -> Result<HashMap<String, String>, OrchestratorError> {
        let mut state = self.state.write().await;
        require_one_of(*state, &[OrchestratorState::Initialized, OrchestratorState::Configured], "Configure")?;

        let repository = self.repository().await;
        let mut mapping = HashMap::new();

        for workflow in workflows {
            for trigger in workflow.active_triggers_for(ProviderId::Scheduler) {
                let source_id = trigger.source_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                let source: Schedule = match repository.find_by_id(&source_id).await? {
                    Some(mut existing) => {
                        existing.update_configuration(trigger.config.clone())?;
                        existing
                    }
                    None => Schedule::new(source_id.clone(), trigger.config.clone())?,
                };
                repository.save(&source).await?;
                mapping.insert(trigger.id.clone(), source_id);
            }
        }

        *state = OrchestratorState::Configured;
        Ok(mapping)
    }

    async fn prepare(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().await;
        require(*state, OrchestratorState::Configured, "Prepare")?;

        let repository = self.repository().await;
        repository.find_all_active().await?;

        *state = OrchestratorState::Prepared;
        Ok(())
    }

    async fn start(&self, callback: SourceEventCallback) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().await;
        if *state == OrchestratorState::Running {
            return Ok(());
        }
        require(*state, OrchestratorState::Prepared, "Start")?;

        let repository = self.repository().await;
        let poller = Arc::new(SchedulePoller::new(repository, callback));
        poller.start().await;

        *self.poller.write().await = Some(poller);
        *state = OrchestratorState::Running;
        Ok(())
    }

    async fn stop(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().await;
        if *state == OrchestratorState::Stopped {
            return Ok(());
        }

        if let Some(poller) = self.poller.write().await.take() {
            poller.stop().await;
        }
        if let Some(repository) = self.repository.read().await.as_ref() {
            repository.close().await?;
        }

        *state = OrchestratorState::Stopped;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use operion_sources_core::workflow::{TriggerNode, WorkflowStatus};
    use serde_json::json;

    fn set_persistence_url(dir: &tempfile::TempDir) {
        std::env::set_var(PERSISTENCE_URL_VAR, format!("file://{}", dir.path().display()));
    }

    #[tokio::test]
    async fn configure_upserts_matching_trigger_nodes() {
        let dir = tempfile::tempdir().unwrap();
        set_persistence_url(&dir);
        let orchestrator = SchedulerOrchestrator::new();
        orchestrator.initialize().await.unwrap();

        let workflow = Workflow {
            id: "w1".into(),
            status: WorkflowStatus::Active,
            trigger_nodes: vec![TriggerNode {
                id: "trigger1".into(),
                provider_id: ProviderId::Scheduler,
                source_id: Some("sch1".into()),
                config: json!({"cron_expression": "*/5 * * * *"}),
            }],
        };

        let mapping = orchestrator.configure(std::slice::from_ref(&workflow)).await.unwrap();
        assert_eq!(mapping.get("trigger1"), Some(&"sch1".to_string()));

        std::env::remove_var(PERSISTENCE_URL_VAR);
    }

    #[tokio::test]
    async fn full_lifecycle_starts_and_stops_poller() {
        let dir = tempfile::tempdir().unwrap();
        set_persistence_url(&dir);
        let orchestrator = SchedulerOrchestrator::new();
        orchestrator.initialize().await.unwrap();
        orchestrator.configure(&[]).await.unwrap();
        orchestrator.prepare().await.unwrap();

        let callback = SourceEventCallback::new(|_event| async { Ok(()) });
        orchestrator.start(callback).await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Running);

        orchestrator.stop().await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Stopped);

        std::env::remove_var(PERSISTENCE_URL_VAR);
    }
}
