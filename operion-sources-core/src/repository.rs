//! Persistence adapter contracts.
//!
//! One trait per provider's logical source, narrowed to the operations
//! each provider actually needs rather than a generic CRUD surface.
//! `ById` / `ByExternalId` return `Ok(None)` for a missing row — that is
//! not an error (see [`crate::error::PersistenceError`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::model::{BrokerSource, Schedule, WebhookSource};

#[async_trait]
pub trait SourceRepository<T>: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<T>, PersistenceError>;
    async fn find_by_external_id(&self, external_id: Uuid) -> Result<Option<T>, PersistenceError>;
    /// All sources regardless of `active`.
    async fn find_all(&self) -> Result<Vec<T>, PersistenceError>;
    /// Only `active` sources.
    async fn find_all_active(&self) -> Result<Vec<T>, PersistenceError>;
    async fn save(&self, source: &T) -> Result<(), PersistenceError>;
    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;
    /// Flush pending writes. A no-op for backends with nothing to flush.
    async fn close(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[async_trait]
pub trait WebhookSourceRepository: SourceRepository<WebhookSource> {}

#[async_trait]
pub trait BrokerSourceRepository: SourceRepository<BrokerSource> {
    /// Lookup by connection fingerprint, used by the consumer manager
    /// registry to detect sources that can share a consumer.
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<BrokerSource>, PersistenceError>;
}

#[async_trait]
pub trait ScheduleRepository: SourceRepository<Schedule> {
    /// All active schedules with `next_due_at <= before`, used by the
    /// poller's scan step.
    async fn find_due_before(&self, before: DateTime<Utc>) -> Result<Vec<Schedule>, PersistenceError>;
}

/// Reported by `/health`: whether the backend is
/// currently reachable, without raising an error for a routine health poll.
#[async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> bool;
}
