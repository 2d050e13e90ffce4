//! Source model, validator, persistence contracts and the external event
//! callback shared by every operion event-source provider.
//!
//! This crate has no provider-specific or backend-specific code — see
//! `operion-sources-file`, `operion-sources-sql`, `operion-sources-kafka`,
//! `operion-sources-webhook` and `operion-sources-scheduler` for those.

pub mod callback;
pub mod cron;
pub mod env;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod repository;
pub mod validation;
pub mod workflow;

pub mod prelude {
    pub use crate::callback::{CallbackError, SourceEvent, SourceEventCallback};
    pub use crate::error::{ConfigError, ModelError, PersistenceError, ValidationError};
    pub use crate::model::{BrokerSource, ConnectionDetails, ProviderId, Schedule, Source, WebhookSource};
    pub use crate::repository::{
        BrokerSourceRepository, HealthCheckable, ScheduleRepository, SourceRepository, WebhookSourceRepository,
    };
    pub use crate::validation::SchemaValidator;
    pub use crate::workflow::{TriggerNode, Workflow, WorkflowStatus};
}
