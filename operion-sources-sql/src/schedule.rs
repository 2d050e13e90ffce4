//! Relational `ScheduleRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use operion_sources_core::error::PersistenceError;
use operion_sources_core::model::Schedule;
use operion_sources_core::repository::{HealthCheckable, ScheduleRepository, SourceRepository};
use sqlx::any::AnyPool;
use sqlx::Row;
use uuid::Uuid;

use crate::dialect::Dialect;
use crate::error::SqlxErrorExt;

pub struct SqlScheduleRepository {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlScheduleRepository {
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

fn row_to_source(row: &sqlx::any::AnyRow) -> Result<Schedule, PersistenceError> {
    let configuration: String = row.try_get("configuration").map_err(PersistenceError::backend)?;
    let schema: Option<String> = row.try_get("schema").map_err(PersistenceError::backend)?;
    let external_id: String = row.try_get("external_id").map_err(PersistenceError::backend)?;
    let created_at: String = row.try_get("created_at").map_err(PersistenceError::backend)?;
    let updated_at: String = row.try_get("updated_at").map_err(PersistenceError::backend)?;
    let next_due_at: String = row.try_get("next_due_at").map_err(PersistenceError::backend)?;

    Ok(Schedule {
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
        cron_expression: row.try_get("cron_expression").map_err(PersistenceError::backend)?,
        next_due_at: parse_timestamp(&next_due_at)?,
    })
}

#[async_trait]
impl SourceRepository<Schedule> for SqlScheduleRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Schedule>, PersistenceError> {
        let row = sqlx::query(&self.sql("SELECT * FROM schedules WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .into_persistence_error()?;
        row.as_ref().map(row_to_source).transpose()
    }

    async fn find_by_external_id(&self, external_id: Uuid) -> Result<Option<Schedule>, PersistenceError> {
        let row = sqlx::query(&self.sql("SELECT * FROM schedules WHERE external_id = ?"))
            .bind(external_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .into_persistence_error()?;
        row.as_ref().map(row_to_source).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Schedule>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM schedules")
            .fetch_all(&self.pool)
            .await
            .into_persistence_error()?;
        rows.iter().map(row_to_source).collect()
    }

    async fn find_all_active(&self) -> Result<Vec<Schedule>, PersistenceError> {
        let rows = sqlx::query(&self.sql("SELECT * FROM schedules WHERE active = ?"))
            .bind(true)
            .fetch_all(&self.pool)
            .await
            .into_persistence_error()?;
        rows.iter().map(row_to_source).collect()
    }

    async fn save(&self, source: &Schedule) -> Result<(), PersistenceError> {
        let configuration = serde_json::to_string(&source.configuration).map_err(PersistenceError::serialization)?;
        let schema = source
            .schema
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(PersistenceError::serialization)?;

        sqlx::query(&self.sql("DELETE FROM schedules WHERE id = ?"))
            .bind(&source.id)
            .execute(&self.pool)
            .await
            .into_persistence_error()?;

        sqlx::query(&self.sql(
            "INSERT INTO schedules \
                (id, external_id, configuration, schema, active, created_at, updated_at, \
                 cron_expression, next_due_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        ))
        .bind(&source.id)
        .bind(source.external_id.to_string())
        .bind(configuration)
        .bind(schema)
        .bind(source.active)
        .bind(source.created_at.to_rfc3339())
        .bind(source.updated_at.to_rfc3339())
        .bind(&source.cron_expression)
        .bind(source.next_due_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .into_persistence_error()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        sqlx::query(&self.sql("DELETE FROM schedules WHERE id = ?"))
            .bind(id)
            .execute(&self.pool)
            .await
            .into_persistence_error()?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleRepository for SqlScheduleRepository {
    async fn find_due_before(&self, before: DateTime<Utc>) -> Result<Vec<Schedule>, PersistenceError> {
        let rows = sqlx::query(&self.sql("SELECT * FROM schedules WHERE active = ? AND next_due_at <= ?"))
            .bind(true)
            .bind(before.to_rfc3339())
            .fetch_all(&self.pool)
            .await
            .into_persistence_error()?;
        rows.iter().map(row_to_source).collect()
    }
}

#[async_trait]
impl HealthCheckable for SqlScheduleRepository {
    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await.is_ok()
    }
}
