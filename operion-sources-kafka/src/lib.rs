//! Broker consumer manager for operion event-source providers.
//!
//! One [`manager::ConsumerManager`] per unique connection fingerprint,
//! multiplexing every claimed record to every `BrokerSource` sharing that
//! fingerprint; [`registry::ConsumerManagerRegistry`] keeps that set in
//! sync with persistence.

pub mod context;
pub mod error;
pub mod manager;
pub mod registry;

pub use error::KafkaManagerError;
pub use manager::{ConsumerManager, ManagerState};
pub use registry::ConsumerManagerRegistry;
