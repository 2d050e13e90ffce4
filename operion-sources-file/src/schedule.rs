//! File-backed `ScheduleRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use operion_sources_core::error::PersistenceError;
use operion_sources_core::model::Schedule;
use operion_sources_core::repository::{HealthCheckable, ScheduleRepository, SourceRepository};
use uuid::Uuid;

use crate::store::FileStore;

pub struct FileScheduleRepository {
    store: FileStore<Schedule>,
}

impl FileScheduleRepository {
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, PersistenceError> {
        Ok(Self {
            store: FileStore::open(path).await?,
        })
    }
}

#[async_trait]
impl SourceRepository<Schedule> for FileScheduleRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Schedule>, PersistenceError> {
        Ok(self.store.find_by_id(id).await)
    }

    async fn find_by_external_id(&self, external_id: Uuid) -> Result<Option<Schedule>, PersistenceError> {
        Ok(self.store.find_by_external_id(external_id).await)
    }

    async fn find_all(&self) -> Result<Vec<Schedule>, PersistenceError> {
        Ok(self.store.find_all().await)
    }

    async fn find_all_active(&self) -> Result<Vec<Schedule>, PersistenceError> {
        Ok(self.store.find_all_active().await)
    }

    async fn save(&self, source: &Schedule) -> Result<(), PersistenceError> {
        self.store.upsert(source.clone()).await
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.store.delete(id).await
    }
}

#[async_trait]
impl ScheduleRepository for FileScheduleRepository {
    async fn find_due_before(&self, before: DateTime<Utc>) -> Result<Vec<Schedule>, PersistenceError> {
        Ok(self
            .store
            .find_where(|s| s.active && s.next_due_at <= before)
            .await)
    }
}

#[async_trait]
impl HealthCheckable for FileScheduleRepository {
    async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn find_due_before_filters_inactive_and_future() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileScheduleRepository::open(dir.path().join("schedules.json"))
            .await
            .unwrap();

        let due = Schedule::new("due", json!({"cron_expression": "*/1 * * * *"})).unwrap();
        let mut future = Schedule::new("future", json!({"cron_expression": "*/1 * * * *"})).unwrap();
        future.next_due_at = Utc::now() + Duration::days(1);
        let mut inactive = Schedule::new("inactive", json!({"cron_expression": "*/1 * * * *"})).unwrap();
        inactive.active = false;

        repo.save(&due).await.unwrap();
        repo.save(&future).await.unwrap();
        repo.save(&inactive).await.unwrap();

        let due_rows = repo.find_due_before(Utc::now() + Duration::minutes(2)).await.unwrap();
        let ids: Vec<_> = due_rows.iter().map(|s| s.id.clone()).collect();
        assert!(ids.contains(&"due".to_string()));
        assert!(!ids.contains(&"future".to_string()));
        assert!(!ids.contains(&"inactive".to_string()));
    }
}
