//! Relational `WebhookSourceRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use operion_sources_core::error::PersistenceError;
use operion_sources_core::model::WebhookSource;
use operion_sources_core::repository::{HealthCheckable, SourceRepository, WebhookSourceRepository};
use sqlx::any::AnyPool;
use sqlx::Row;
use uuid::Uuid;

use crate::dialect::Dialect;
use crate::error::SqlxErrorExt;

pub struct SqlWebhookSourceRepository {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlWebhookSourceRepository {
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    fn sql(&self, query: &str) -> String {
        self.dialect.rewrite_placeholders(query)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(PersistenceError::serialization)
}

fn row_to_source(row: &sqlx::any::AnyRow) -> Result<WebhookSource, PersistenceError> {
    let configuration: String = row.try_get("configuration").map_err(PersistenceError::backend)?;
    let schema: Option<String> = row.try_get("schema").map_err(PersistenceError::backend)?;
    let external_id: String = row.try_get("external_id").map_err(PersistenceError::backend)?;
    let created_at: String = row.try_get("created_at").map_err(PersistenceError::backend)?;
    let updated_at: String = row.try_get("updated_at").map_err(PersistenceError::backend)?;

    Ok(WebhookSource {
        id: row.try_get("id").map_err(PersistenceError::backend)?,
        external_id: Uuid::parse_str(&external_id).map_err(PersistenceError::serialization)?,
        configuration: serde_json::from_str(&configuration).map_err(PersistenceError::serialization)?,
        schema: schema
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(PersistenceError::serialization)?,
        active: row.try_get("active").map_err(PersistenceError::backend)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl SourceRepository<WebhookSource> for SqlWebhookSourceRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<WebhookSource>, PersistenceError> {
        let row = sqlx::query(&self.sql("SELECT * FROM webhook_sources WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .into_persistence_error()?;
        row.as_ref().map(row_to_source).transpose()
    }

    async fn find_by_external_id(&self, external_id: Uuid) -> Result<Option<WebhookSource>, PersistenceError> {
        let row = sqlx::query(&self.sql("SELECT * FROM webhook_sources WHERE external_id = ?"))
            .bind(external_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .into_persistence_error()?;
        row.as_ref().map(row_to_source).transpose()
    }

    async fn find_all(&self) -> Result<Vec<WebhookSource>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM webhook_sources")
            .fetch_all(&self.pool)
            .await
            .into_persistence_error()?;
        rows.iter().map(row_to_source).collect()
    }

    async fn find_all_active(&self) -> Result<Vec<WebhookSource>, PersistenceError> {
        let rows = sqlx::query(&self.sql("SELECT * FROM webhook_sources WHERE active = ?"))
            .bind(true)
            .fetch_all(&self.pool)
            .await
            .into_persistence_error()?;
        rows.iter().map(row_to_source).collect()
    }

    async fn save(&self, source: &WebhookSource) -> Result<(), PersistenceError> {
        let configuration = serde_json::to_string(&source.configuration).map_err(PersistenceError::serialization)?;
        let schema = source
            .schema
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(PersistenceError::serialization)?;

        sqlx::query(&self.sql("DELETE FROM webhook_sources WHERE id = ?"))
            .bind(&source.id)
            .execute(&self.pool)
            .await
            .into_persistence_error()?;

        sqlx::query(&self.sql(
            "INSERT INTO webhook_sources (id, external_id, configuration, schema, active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        ))
        .bind(&source.id)
        .bind(source.external_id.to_string())
        .bind(configuration)
        .bind(schema)
        .bind(source.active)
        .bind(source.created_at.to_rfc3339())
        .bind(source.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .into_persistence_error()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        sqlx::query(&self.sql("DELETE FROM webhook_sources WHERE id = ?"))
            .bind(id)
            .execute(&self.pool)
            .await
            .into_persistence_error()?;
        Ok(())
    }
}

impl WebhookSourceRepository for SqlWebhookSourceRepository {}

#[async_trait]
impl HealthCheckable for SqlWebhookSourceRepository {
    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn repo() -> SqlWebhookSourceRepository {
        let (pool, dialect) = crate::connect("sqlite::memory:").await.unwrap();
        SqlWebhookSourceRepository::new(pool, dialect)
    }

    #[tokio::test]
    async fn save_then_find_by_external_id() {
        let repo = repo().await;
        let source = WebhookSource::new("wh1", json!({})).unwrap();
        repo.save(&source).await.unwrap();

        let found = repo.find_by_external_id(source.external_id).await.unwrap().unwrap();
        assert_eq!(found.id, "wh1");
    }

    #[tokio::test]
    async fn missing_id_returns_ok_none_not_error() {
        let repo = repo().await;
        let result = repo.find_by_id("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = repo().await;
        repo.delete("missing").await.unwrap();
        let source = WebhookSource::new("wh1", json!({})).unwrap();
        repo.save(&source).await.unwrap();
        repo.delete("wh1").await.unwrap();
        repo.delete("wh1").await.unwrap();
        assert!(repo.find_by_id("wh1").await.unwrap().is_none());
    }
}
