//! `ConsumerManagerRegistry`: the `updateConsumerManagers()` reconcile
//! algorithm.

use std::collections::HashMap;
use std::sync::Arc;

use operion_sources_core::callback::SourceEventCallback;
use operion_sources_core::model::BrokerSource;
use operion_sources_core::repository::BrokerSourceRepository;
use operion_sources_core::validation::SchemaValidator;
use tokio::sync::RwLock;

use crate::error::KafkaManagerError;
use crate::manager::ConsumerManager;

/// Owns the fingerprint-keyed set of live [`ConsumerManager`]s, and the
/// shared validator/callback every manager it creates is wired with.
pub struct ConsumerManagerRegistry {
    repository: Arc<dyn BrokerSourceRepository>,
    validator: Arc<SchemaValidator>,
    callback: SourceEventCallback,
    managers: RwLock<HashMap<String, Arc<ConsumerManager>>>,
}

impl ConsumerManagerRegistry {
    pub fn new(repository: Arc<dyn BrokerSourceRepository>, callback: SourceEventCallback) -> Self {
        Self {
            repository,
            validator: Arc::new(SchemaValidator::new()),
            callback,
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// `updateConsumerManagers()`: bucket active sources by fingerprint,
    /// create/replace/stop managers to match.
    pub async fn reconcile(&self) -> Result<(), KafkaManagerError> {
        let active = self.repository.find_all_active().await?;

        let mut buckets: HashMap<String, Vec<BrokerSource>> = HashMap::new();
        for source in active {
            buckets
                .entry(source.connection_fingerprint.clone())
                .or_default()
                .push(source);
        }

        let mut managers = self.managers.write().await;

        for (fingerprint, sources) in &buckets {
            if let Some(manager) = managers.get(fingerprint) {
                manager.replace_sources(sources.clone()).await;
                continue;
            }

            let first = &sources[0];
            let manager = Arc::new(ConsumerManager::new(
                fingerprint.clone(),
                first.connection_details.clone(),
                first.consumer_group(),
                sources.clone(),
                Arc::clone(&self.validator),
                self.callback.clone(),
            ));
            manager.start().await?;
            managers.insert(fingerprint.clone(), manager);
        }

        let stale: Vec<String> = managers
            .keys()
            .filter(|fp| !buckets.contains_key(*fp))
            .cloned()
            .collect();
        for fingerprint in stale {
            if let Some(manager) = managers.remove(&fingerprint) {
                manager.stop().await;
            }
        }

        Ok(())
    }

    /// Stop every live manager, called from the orchestrator's `Stop`.
    pub async fn stop_all(&self) {
        let mut managers = self.managers.write().await;
        for (_, manager) in managers.drain() {
            manager.stop().await;
        }
    }

    pub async fn manager_count(&self) -> usize {
        self.managers.read().await.len()
    }
}
