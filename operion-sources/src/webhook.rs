//! Webhook provider orchestrator.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use operion_sources_core::callback::SourceEventCallback;
use operion_sources_core::env::{file_base_path, persistence_scheme, port_var, required_var, PersistenceScheme};
use operion_sources_core::model::ProviderId;
use operion_sources_core::repository::WebhookSourceRepository;
use operion_sources_core::validation::SchemaValidator;
use operion_sources_core::workflow::Workflow;
use operion_sources_core::model::WebhookSource;
use operion_sources_file::FileWebhookSourceRepository;
use operion_sources_sql::SqlWebhookSourceRepository;
use operion_sources_webhook::WebhookServerState;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;
use crate::state::{require, require_one_of, OrchestratorState};

const PERSISTENCE_URL_VAR: &str = "WEBHOOK_PERSISTENCE_URL";
const PORT_VAR: &str = "WEBHOOK_PORT";
const DEFAULT_PORT: u16 = 8085;
const FILE_NAME: &str = "webhook_sources.json";
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct WebhookOrchestrator {
    state: RwLock<OrchestratorState>,
    repository: RwLock<Option<Arc<dyn WebhookSourceRepository>>>,
    cancel: RwLock<Option<CancellationToken>>,
    server: RwLock<Option<JoinHandle<()>>>,
}

impl WebhookOrchestrator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(OrchestratorState::Uninitialized),
            repository: RwLock::new(None),
            cancel: RwLock::new(None),
            server: RwLock::new(None),
        }
    }

    async fn repository(&self) -> Arc<dyn WebhookSourceRepository> {
        self.repository
            .read()
            .await
            .clone()
            .expect("repository set by initialize() before this call")
    }
}

impl Default for WebhookOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

async fn open_repository(url: &str) -> Result<Arc<dyn WebhookSourceRepository>, OrchestratorError> {
    match persistence_scheme(PERSISTENCE_URL_VAR, url)? {
        PersistenceScheme::File => {
            let path = file_base_path(url).join(FILE_NAME);
            Ok(Arc::new(FileWebhookSourceRepository::open(path).await?))
        }
        PersistenceScheme::Postgres | PersistenceScheme::MySql | PersistenceScheme::Sqlite => {
            let (pool, dialect) = operion_sources_sql::connect(url).await?;
            Ok(Arc::new(SqlWebhookSourceRepository::new(pool, dialect)))
        }
    }
}

#[async_trait]
impl Orchestrator for WebhookOrchestrator {
    fn provider_name(&self) -> &'static str {
        "webhook"
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
            for trigger in workflow.active_triggers_for(ProviderId::Webhook) {
                let source_id = trigger.source_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                let source = match repository.find_by_id(&source_id).await? {
                    Some(mut existing) => {
                        existing.update_configuration(trigger.config.clone());
                        existing
                    }
                    None => WebhookSource::new(source_id.clone(), trigger.config.clone())?,
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
        let active = repository.find_all_active().await?;
        for source in &active {
            tracing::info!(source_id = %source.id, external_id = %source.external_id, "registering webhook source");
        }

        *state = OrchestratorState::Prepared;
        Ok(())
    }

    async fn start(&self, callback: SourceEventCallback) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().await;
        if *state == OrchestratorState::Running {
            return Ok(());
        }
        require(*state, OrchestratorState::Prepared, "Start")?;

        let port = port_var(PORT_VAR, DEFAULT_PORT)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let repository = self.repository().await;
        let server_state = Arc::new(WebhookServerState::new(repository, Arc::new(SchemaValidator::new()), callback, MAX_BODY_BYTES));

        let cancel = CancellationToken::new();
        let serve_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = operion_sources_webhook::serve(addr, server_state, serve_cancel).await {
                tracing::error!(%err, "webhook server exited with an error");
            }
        });

        *self.cancel.write().await = Some(cancel);
        *self.server.write().await = Some(handle);
        *state = OrchestratorState::Running;
        Ok(())
    }

    async fn stop(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().await;
        if *state == OrchestratorState::Stopped {
            return Ok(());
        }

        if let Some(cancel) = self.cancel.write().await.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.server.write().await.take() {
            // `serve()` already bounds its own shutdown to a 5s grace period;
            // no extra outer timeout is needed here.
            let _ = handle.await;
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
        let orchestrator = WebhookOrchestrator::new();
        orchestrator.initialize().await.unwrap();

        let workflow = Workflow {
            id: "w1".into(),
            status: WorkflowStatus::Active,
            trigger_nodes: vec![TriggerNode {
                id: "trigger1".into(),
                provider_id: ProviderId::Webhook,
                source_id: None,
                config: json!({}),
            }],
        };

        let mapping = orchestrator.configure(std::slice::from_ref(&workflow)).await.unwrap();
        assert_eq!(mapping.len(), 1);
        let source_id = mapping.get("trigger1").unwrap();

        let repository = orchestrator.repository().await;
        assert!(repository.find_by_id(source_id).await.unwrap().is_some());

        std::env::remove_var(PERSISTENCE_URL_VAR);
    }

    #[tokio::test]
    async fn prepare_requires_configured_state() {
        let dir = tempfile::tempdir().unwrap();
        set_persistence_url(&dir);
        let orchestrator = WebhookOrchestrator::new();
        orchestrator.initialize().await.unwrap();

        let err = orchestrator.prepare().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        std::env::remove_var(PERSISTENCE_URL_VAR);
    }

    #[tokio::test]
    async fn full_lifecycle_starts_and_stops_server() {
        let dir = tempfile::tempdir().unwrap();
        set_persistence_url(&dir);
        std::env::set_var(PORT_VAR, "0");
        let orchestrator = WebhookOrchestrator::new();
        orchestrator.initialize().await.unwrap();
        orchestrator.configure(&[]).await.unwrap();
        orchestrator.prepare().await.unwrap();

        let callback = SourceEventCallback::new(|_event| async { Ok(()) });
        // WEBHOOK_PORT=0 lets the OS assign an ephemeral port so this test
        // doesn't collide with anything else listening on the machine.
        orchestrator.start(callback).await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Running);

        orchestrator.stop().await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Stopped);

        std::env::remove_var(PERSISTENCE_URL_VAR);
        std::env::remove_var(PORT_VAR);
    }
}
