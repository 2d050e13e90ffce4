//! File-backed `WebhookSourceRepository`.

use async_trait::async_trait;
use operion_sources_core::error::PersistenceError;
use operion_sources_core::model::WebhookSource;
use operion_sources_core::repository::{HealthCheckable, SourceRepository, WebhookSourceRepository};
use uuid::Uuid;

use crate::store::FileStore;

pub struct FileWebhookSourceRepository {
    store: FileStore<WebhookSource>,
}

impl FileWebhookSourceRepository {
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, PersistenceError> {
        Ok(Self {
            store: FileStore::open(path).await?,
        })
    }
}

#[async_trait]
impl SourceRepository<WebhookSource> for FileWebhookSourceRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<WebhookSource>, PersistenceError> {
        Ok(self.store.find_by_id(id).await)
    }

    async fn find_by_external_id(&self, external_id: Uuid) -> Result<Option<WebhookSource>, PersistenceError> {
        Ok(self.store.find_by_external_id(external_id).await)
    }

    async fn find_all(&self) -> Result<Vec<WebhookSource>, PersistenceError> {
        Ok(self.store.find_all().await)
    }

    async fn find_all_active(&self) -> Result<Vec<WebhookSource>, PersistenceError> {
        Ok(self.store.find_all_active().await)
    }

    async fn save(&self, source: &WebhookSource) -> Result<(), PersistenceError> {
        self.store.upsert(source.clone()).await
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.store.delete(id).await
    }
}

impl WebhookSourceRepository for FileWebhookSourceRepository {}

#[async_trait]
impl HealthCheckable for FileWebhookSourceRepository {
    async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_then_find_by_external_id() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileWebhookSourceRepository::open(dir.path().join("webhooks.json"))
            .await
            .unwrap();
        let source = WebhookSource::new("wh1", json!({})).unwrap();
        repo.save(&source).await.unwrap();

        let found = repo.find_by_external_id(source.external_id).await.unwrap().unwrap();
        assert_eq!(found.id, "wh1");
    }

    #[tokio::test]
    async fn missing_id_returns_ok_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileWebhookSourceRepository::open(dir.path().join("webhooks.json"))
            .await
            .unwrap();
        let result = repo.find_by_id("missing").await.unwrap();
        assert!(result.is_none());
    }
}
