//! Schedule poller for operion event-source providers.

pub mod error;
pub mod poller;

pub use error::SchedulerError;
pub use poller::{PollerState, SchedulePoller};
