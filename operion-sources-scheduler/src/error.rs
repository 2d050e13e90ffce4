//! Error type for the schedule poller.

use std::fmt;

use operion_sources_core::error::PersistenceError;

#[derive(Debug)]
pub enum SchedulerError {
    Persistence(PersistenceError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Persistence(err) => write!(f, "persistence error: {err}"),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<PersistenceError> for SchedulerError {
    fn from(err: PersistenceError) -> Self {
        SchedulerError::Persistence(err)
    }
}
