//! Relational `BrokerSourceRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use operion_sources_core::error::PersistenceError;
use operion_sources_core::model::{BrokerSource, ConnectionDetails};
use operion_sources_core::repository::{BrokerSourceRepository, HealthCheckable, SourceRepository};
use sqlx::any::AnyPool;
use sqlx::Row;
use uuid::Uuid;

use crate::dialect::Dialect;
use crate::error::SqlxErrorExt;

pub struct SqlBrokerSourceRepository {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlBrokerSourceRepository {
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    fn sql(&self, query: &str) -> String {
        self.dialect.rewrite_placeholders(query)
    }
}

fn row_to_source(row: &sqlx::any::AnyRow) -> Result<BrokerSource, PersistenceError> {
    let configuration: String = row.try_get("configuration").map_err(PersistenceError::backend)?;
    let schema: Option<String> = row.try_get("schema").map_err(PersistenceError::backend)?;
    let external_id: String = row.try_get("external_id").map_err(PersistenceError::backend)?;
    let created_at: String = row.try_get("created_at").map_err(PersistenceError::backend)?;
    let updated_at: String = row.try_get("updated_at").map_err(PersistenceError::backend)?;
    let extra_config: Option<String> = row.try_get("extra_config").map_err(PersistenceError::backend)?;

    Ok(BrokerSource {
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
        connection_details: ConnectionDetails {
            topic: row.try_get("topic").map_err(PersistenceError::backend)?,
            brokers: row.try_get("brokers").map_err(PersistenceError::backend)?,
            consumer_group: row.try_get("consumer_group").map_err(PersistenceError::backend)?,
            extra_config: extra_config
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(PersistenceError::serialization)?
                .unwrap_or(serde_json::Value::Null),
        },
        connection_fingerprint: row.try_get("connection_fingerprint").map_err(PersistenceError::backend)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(PersistenceError::serialization)
}

#[async_trait]
impl SourceRepository<BrokerSource> for SqlBrokerSourceRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<BrokerSource>, PersistenceError> {
        let row = sqlx::query(&self.sql("SELECT * FROM kafka_sources WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .into_persistence_error()?;
        row.as_ref().map(row_to_source).transpose()
    }

    async fn find_by_external_id(&self, external_id: Uuid) -> Result<Option<BrokerSource>, PersistenceError> {
        let row = sqlx::query(&self.sql("SELECT * FROM kafka_sources WHERE external_id = ?"))
            .bind(external_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .into_persistence_error()?;
        row.as_ref().map(row_to_source).transpose()
    }

    async fn find_all(&self) -> Result<Vec<BrokerSource>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM kafka_sources")
            .fetch_all(&self.pool)
            .await
            .into_persistence_error()?;
        rows.iter().map(row_to_source).collect()
    }

    async fn find_all_active(&self) -> Result<Vec<BrokerSource>, PersistenceError> {
        let rows = sqlx::query(&self.sql("SELECT * FROM kafka_sources WHERE active = ?"))
            .bind(true)
            .fetch_all(&self.pool)
            .await
            .into_persistence_error()?;
        rows.iter().map(row_to_source).collect()
    }

    async fn save(&self, source: &BrokerSource) -> Result<(), PersistenceError> {
        let configuration = serde_json::to_string(&source.configuration).map_err(PersistenceError::serialization)?;
        let schema = source
            .schema
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(PersistenceError::serialization)?;
        let extra_config = serde_json::to_string(&source.connection_details.extra_config)
            .map_err(PersistenceError::serialization)?;

        sqlx::query(&self.sql("DELETE FROM kafka_sources WHERE id = ?"))
            .bind(&source.id)
            .execute(&self.pool)
            .await
            .into_persistence_error()?;

        sqlx::query(&self.sql(
            "INSERT INTO kafka_sources \
                (id, external_id, configuration, schema, active, created_at, updated_at, \
                 topic, brokers, consumer_group, extra_config, connection_fingerprint) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        ))
        .bind(&source.id)
        .bind(source.external_id.to_string())
        .bind(configuration)
        .bind(schema)
        .bind(source.active)
        .bind(source.created_at.to_rfc3339())
        .bind(source.updated_at.to_rfc3339())
        .bind(&source.connection_details.topic)
        .bind(&source.connection_details.brokers)
        .bind(source.connection_details.consumer_group.clone())
        .bind(extra_config)
        .bind(&source.connection_fingerprint)
        .execute(&self.pool)
        .await
        .into_persistence_error()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        sqlx::query(&self.sql("DELETE FROM kafka_sources WHERE id = ?"))
            .bind(id)
            .execute(&self.pool)
            .await
            .into_persistence_error()?;
        Ok(())
    }
}

#[async_trait]
impl BrokerSourceRepository for SqlBrokerSourceRepository {
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<BrokerSource>, PersistenceError> {
        let rows = sqlx::query(&self.sql("SELECT * FROM kafka_sources WHERE connection_fingerprint = ?"))
            .bind(fingerprint)
            .fetch_all(&self.pool)
            .await
            .into_persistence_error()?;
        rows.iter().map(row_to_source).collect()
    }
}

#[async_trait]
impl HealthCheckable for SqlBrokerSourceRepository {
    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await.is_ok()
    }
}
