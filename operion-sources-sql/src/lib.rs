//! Relational persistence adapter.
//!
//! A single `sqlx::any::AnyPool` spans SQLite, Postgres and MySQL,
//! selected at runtime from the persistence URL's scheme, so every
//! relational backend is fully implemented rather than just one.

pub mod dialect;
pub mod error;
pub mod kafka;
pub mod migrations;
pub mod schedule;
pub mod webhook;

pub use kafka::SqlBrokerSourceRepository;
pub use schedule::SqlScheduleRepository;
pub use webhook::SqlWebhookSourceRepository;

use operion_sources_core::error::PersistenceError;
use sqlx::any::{AnyPool, AnyPoolOptions};

use crate::dialect::Dialect;

/// Connect to `url`, run pending migrations, and return the pool together
/// with the dialect it resolved to (repositories need both: the pool to
/// run queries, the dialect to render bind placeholders for them).
/// Call once per provider at `Initialize`.
///
/// A `sqlite::memory:` URL is capped to a single pooled connection —
/// SQLite gives each connection to `:memory:` its own private database, so
/// a pool of more than one would make writes on one connection invisible
/// to reads on another.
pub async fn connect(url: &str) -> Result<(AnyPool, Dialect), PersistenceError> {
    sqlx::any::install_default_drivers();
    let dialect = Dialect::from_url(url).ok_or_else(|| {
        PersistenceError::Other(format!("unsupported relational persistence URL: {url}"))
    })?;
    let max_connections = if dialect == Dialect::Sqlite && url.contains(":memory:") {
        1
    } else {
        10
    };
    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .map_err(PersistenceError::backend)?;
    migrations::run(&pool, dialect).await?;
    Ok((pool, dialect))
}
