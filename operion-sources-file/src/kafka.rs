//! File-backed `BrokerSourceRepository`.

use async_trait::async_trait;
use operion_sources_core::error::PersistenceError;
use operion_sources_core::model::BrokerSource;
use operion_sources_core::repository::{BrokerSourceRepository, HealthCheckable, SourceRepository};
use uuid::Uuid;

use crate::store::FileStore;

pub struct FileBrokerSourceRepository {
    store: FileStore<BrokerSource>,
}

impl FileBrokerSourceRepository {
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, PersistenceError> {
        Ok(Self {
            store: FileStore::open(path).await?,
        })
    }
}

#[async_trait]
impl SourceRepository<BrokerSource> for FileBrokerSourceRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<BrokerSource>, PersistenceError> {
        Ok(self.store.find_by_id(id).await)
    }

    async fn find_by_external_id(&self, external_id: Uuid) -> Result<Option<BrokerSource>, PersistenceError> {
        Ok(self.store.find_by_external_id(external_id).await)
    }

    async fn find_all(&self) -> Result<Vec<BrokerSource>, PersistenceError> {
        Ok(self.store.find_all().await)
    }

    async fn find_all_active(&self) -> Result<Vec<BrokerSource>, PersistenceError> {
        Ok(self.store.find_all_active().await)
    }

    async fn save(&self, source: &BrokerSource) -> Result<(), PersistenceError> {
        self.store.upsert(source.clone()).await
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.store.delete(id).await
    }
}

#[async_trait]
impl BrokerSourceRepository for FileBrokerSourceRepository {
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<BrokerSource>, PersistenceError> {
        Ok(self
            .store
            .find_where(|s| s.connection_fingerprint == fingerprint)
            .await)
    }
}

#[async_trait]
impl HealthCheckable for FileBrokerSourceRepository {
    async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}
