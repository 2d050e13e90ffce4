//! Versioned schema migrations.
//!
//! Applied in order, each guarded by `CREATE TABLE IF NOT EXISTS` /
//! `CREATE INDEX IF NOT EXISTS` so re-running is harmless, and recorded in
//! `schema_migrations` so a future migration can tell what's already
//! applied.

use sqlx::any::AnyPool;

use operion_sources_core::error::PersistenceError;

use crate::dialect::Dialect;

struct Migration {
    version: i64,
    description: &'static str,
    up: fn(Dialect) -> Vec<String>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 2,
        description: "kafka broker sources",
        up: kafka_sources_ddl,
    },
    Migration {
        version: 3,
        description: "scheduler schedules",
        up: schedules_ddl,
    },
    Migration {
        version: 4,
        description: "webhook sources",
        up: webhook_sources_ddl,
    },
];

/// Apply every migration that hasn't run yet, in version order.
pub async fn run(pool: &AnyPool, dialect: Dialect) -> Result<(), PersistenceError> {
    ensure_schema_migrations_table(pool, dialect).await?;

    for migration in MIGRATIONS {
        if already_applied(pool, migration.version, dialect).await? {
            continue;
        }
        for statement in (migration.up)(dialect) {
            sqlx::query(&statement).execute(pool).await.map_err(PersistenceError::backend)?;
        }
        record_applied(pool, migration.version, dialect).await?;
        tracing::info!(version = migration.version, description = migration.description, "applied migration");
    }
    Ok(())
}

async fn ensure_schema_migrations_table(pool: &AnyPool, dialect: Dialect) -> Result<(), PersistenceError> {
    let int_type = match dialect {
        Dialect::Postgres | Dialect::MySql => "BIGINT",
        Dialect::Sqlite => "INTEGER",
    };
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
            version {int_type} PRIMARY KEY, \
            applied_at_unix {int_type} NOT NULL\
        )"
    );
    sqlx::query(&ddl).execute(pool).await.map_err(PersistenceError::backend)?;
    Ok(())
}

async fn already_applied(pool: &AnyPool, version: i64, dialect: Dialect) -> Result<bool, PersistenceError> {
    let sql = dialect.rewrite_placeholders("SELECT version FROM schema_migrations WHERE version = ?");
    let row = sqlx::query(&sql)
        .bind(version)
        .fetch_optional(pool)
        .await
        .map_err(PersistenceError::backend)?;
    Ok(row.is_some())
}

async fn record_applied(pool: &AnyPool, version: i64, dialect: Dialect) -> Result<(), PersistenceError> {
    let now = chrono::Utc::now().timestamp();
    let sql = dialect.rewrite_placeholders("INSERT INTO schema_migrations (version, applied_at_unix) VALUES (?, ?)");
    sqlx::query(&sql)
        .bind(version)
        .bind(now)
        .execute(pool)
        .await
        .map_err(PersistenceError::backend)?;
    Ok(())
}

fn kafka_sources_ddl(dialect: Dialect) -> Vec<String> {
    let text = text_type(dialect);
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS kafka_sources (\
                id {text} PRIMARY KEY, \
                external_id {text} NOT NULL, \
                configuration {text} NOT NULL, \
                schema {text}, \
                active BOOLEAN NOT NULL, \
                created_at {text} NOT NULL, \
                updated_at {text} NOT NULL, \
                topic {text} NOT NULL, \
                brokers {text} NOT NULL, \
                consumer_group {text}, \
                extra_config {text}, \
                connection_fingerprint {text} NOT NULL\
            )"
        ),
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_kafka_sources_external_id ON kafka_sources (external_id)".to_string(),
        "CREATE INDEX IF NOT EXISTS idx_kafka_sources_fingerprint ON kafka_sources (connection_fingerprint)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_kafka_sources_active ON kafka_sources (active)".to_string(),
    ]
}

fn schedules_ddl(dialect: Dialect) -> Vec<String> {
    let text = text_type(dialect);
    let mut statements = vec![
        format!(
            "CREATE TABLE IF NOT EXISTS schedules (\
                id {text} PRIMARY KEY, \
                external_id {text} NOT NULL, \
                configuration {text} NOT NULL, \
                schema {text}, \
                active BOOLEAN NOT NULL, \
                created_at {text} NOT NULL, \
                updated_at {text} NOT NULL, \
                cron_expression {text} NOT NULL, \
                next_due_at {text} NOT NULL\
            )"
        ),
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_schedules_external_id ON schedules (external_id)".to_string(),
    ];
    // MySQL has no partial-index syntax; fall back to a plain index on
    // next_due_at there, without the `WHERE active` filter baked into the
    // index itself (the due-row scan still applies the filter in the query).
    statements.push(match dialect {
        Dialect::Postgres | Dialect::Sqlite => {
            "CREATE INDEX IF NOT EXISTS idx_schedules_due ON schedules (next_due_at) WHERE active = true".to_string()
        }
        Dialect::MySql => "CREATE INDEX IF NOT EXISTS idx_schedules_due ON schedules (active, next_due_at)"
            .to_string(),
    });
    statements
}

fn webhook_sources_ddl(dialect: Dialect) -> Vec<String> {
    let text = text_type(dialect);
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS webhook_sources (\
                id {text} PRIMARY KEY, \
                external_id {text} NOT NULL, \
                configuration {text} NOT NULL, \
                schema {text}, \
                active BOOLEAN NOT NULL, \
                created_at {text} NOT NULL, \
                updated_at {text} NOT NULL\
            )"
        ),
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_webhook_sources_external_id ON webhook_sources (external_id)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_webhook_sources_active ON webhook_sources (active)".to_string(),
    ]
}

fn text_type(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "TEXT",
        Dialect::MySql => "TEXT",
        Dialect::Sqlite => "TEXT",
    }
}
