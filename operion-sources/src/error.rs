//! Orchestrator-level errors.

use std::fmt;

use operion_sources_core::error::{ConfigError, ModelError, PersistenceError};

#[derive(Debug)]
pub enum OrchestratorError {
    /// Called out of turn (e.g. `Start` before `Prepare`).
    InvalidTransition { from: &'static str, op: &'static str },
    Config(ConfigError),
    Persistence(PersistenceError),
    Model(ModelError),
    /// A runtime failure during `Start`; failures here roll back any
    /// partial state rather than leaving the orchestrator half-started.
    StartFailed(String),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::InvalidTransition { from, op } => {
                write!(f, "cannot {op} from state {from}")
            }
            OrchestratorError::Config(err) => write!(f, "{err}"),
            OrchestratorError::Persistence(err) => write!(f, "{err}"),
            OrchestratorError::Model(err) => write!(f, "{err}"),
            OrchestratorError::StartFailed(msg) => write!(f, "start failed: {msg}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<ConfigError> for OrchestratorError {
    fn from(err: ConfigError) -> Self {
        OrchestratorError::Config(err)
    }
}

impl From<PersistenceError> for OrchestratorError {
    fn from(err: PersistenceError) -> Self {
        OrchestratorError::Persistence(err)
    }
}

impl From<ModelError> for OrchestratorError {
    fn from(err: ModelError) -> Self {
        OrchestratorError::Model(err)
    }
}
