//! Broker (Kafka) provider orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use operion_sources_core::callback::SourceEventCallback;
use operion_sources_core::env::{file_base_path, persistence_scheme, required_var, PersistenceScheme};
use operion_sources_core::model::{BrokerSource, ProviderId};
use operion_sources_core::repository::BrokerSourceRepository;
use operion_sources_core::workflow::Workflow;
use operion_sources_file::FileBrokerSourceRepository;
use operion_sources_kafka::ConsumerManagerRegistry;
use operion_sources_sql::SqlBrokerSourceRepository;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;
use crate::state::{require, require_one_of, OrchestratorState};

const PERSISTENCE_URL_VAR: &str = "KAFKA_PERSISTENCE_URL";
const FILE_NAME: &str = "kafka_sources.json";

/// Owns the broker provider's persistence handle and consumer-manager
/// registry. Reconcile is deferred to [`Self::start`] rather than
/// [`Self::configure`]: a [`ConsumerManagerRegistry`] is built with the
/// event callback fixed at construction, and the callback is not
/// available until `Start` stores it and starts the runtime. Any number
/// of `Configure` calls before `Start` simply accumulate persisted
/// sources; the single reconcile at `Start` picks up whatever is on
/// disk/in the database at that point.
pub struct KafkaOrchestrator {
    state: RwLock<OrchestratorState>,
    repository: RwLock<Option<Arc<dyn BrokerSourceRepository>>>,
    registry: RwLock<Option<Arc<ConsumerManagerRegistry>>>,
}

impl KafkaOrchestrator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(OrchestratorState::Uninitialized),
            repository: RwLock::new(None),
            registry: RwLock::new(None),
        }
    }

    async fn repository(&self) -> Arc<dyn BrokerSourceRepository> {
        self.repository
            .read()
            .await
            .clone()
            .expect("repository set by initialize() before this call")
    }
}

impl Default for KafkaOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

async fn open_repository(url: &str) -> Result<Arc<dyn BrokerSourceRepository>, OrchestratorError> {
    match persistence_scheme(PERSISTENCE_URL_VAR, url)? {
        PersistenceScheme::File => {
            let path = file_base_path(url).join(FILE_NAME);
            Ok(Arc::new(FileBrokerSourceRepository::open(path).await?))
        }
        PersistenceScheme::Postgres | PersistenceScheme::MySql | PersistenceScheme::Sqlite => {
            let (pool, dialect) = operion_sources_sql::connect(url).await?;
            Ok(Arc::new(SqlBrokerSourceRepository::new(pool, dialect)))
        }
    }
}

#[async_trait]
impl Orchestrator for KafkaOrchestrator {
    fn provider_name(&self) -> &'static str {
        "kafka"
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
            for trigger in workflow.active_triggers_for(ProviderId::Kafka) {
                let source_id = trigger.source_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                let source = match repository.find_by_id(&source_id).await? {
                    Some(mut existing) => {
                        existing.update_configuration(trigger.config.clone())?;
                        existing
                    }
                    None => BrokerSource::new(source_id.clone(), trigger.config.clone())?,
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

        // Validate persistence is reachable; a broker orchestrator has no
        // HTTP server to log-register sources with (that's webhook-only).
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
        let registry = Arc::new(ConsumerManagerRegistry::new(repository, callback));
        registry
            .reconcile()
            .await
            .map_err(|err| OrchestratorError::StartFailed(err.to_string()))?;

        *self.registry.write().await = Some(registry);
        *state = OrchestratorState::Running;
        Ok(())
    }

    async fn stop(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().await;
        if *state == OrchestratorState::Stopped {
            return Ok(());
        }

        if let Some(registry) = self.registry.write().await.take() {
            registry.stop_all().await;
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
    async fn lifecycle_rejects_out_of_order_transitions() {
        let orchestrator = KafkaOrchestrator::new();
        let err = orchestrator.configure(&[]).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn configure_upserts_matching_trigger_nodes() {
        let dir = tempfile::tempdir().unwrap();
        set_persistence_url(&dir);
        let orchestrator = KafkaOrchestrator::new();
        orchestrator.initialize().await.unwrap();

        let workflow = Workflow {
            id: "w1".into(),
            status: WorkflowStatus::Active,
            trigger_nodes: vec![TriggerNode {
                id: "trigger1".into(),
                provider_id: ProviderId::Kafka,
                source_id: Some("src1".into()),
                config: json!({"topic": "orders", "brokers": "localhost:9092"}),
            }],
        };

        let mapping = orchestrator.configure(std::slice::from_ref(&workflow)).await.unwrap();
        assert_eq!(mapping.get("trigger1"), Some(&"src1".to_string()));

        let repository = orchestrator.repository().await;
        assert!(repository.find_by_id("src1").await.unwrap().is_some());

        std::env::remove_var(PERSISTENCE_URL_VAR);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        set_persistence_url(&dir);
        let orchestrator = KafkaOrchestrator::new();
        orchestrator.initialize().await.unwrap();
        orchestrator.configure(&[]).await.unwrap();
        orchestrator.prepare().await.unwrap();

        let callback = SourceEventCallback::new(|_event| async { Ok(()) });
        orchestrator.start(callback.clone()).await.unwrap();
        orchestrator.start(callback).await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Running);

        orchestrator.stop().await.unwrap();
        orchestrator.stop().await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Stopped);

        std::env::remove_var(PERSISTENCE_URL_VAR);
    }
}
