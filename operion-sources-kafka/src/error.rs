//! Errors raised while starting or reconciling broker consumer managers.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub enum KafkaManagerError {
    ConsumerCreation(rdkafka::error::KafkaError),
    Subscription(rdkafka::error::KafkaError),
    Persistence(operion_sources_core::error::PersistenceError),
}

impl fmt::Display for KafkaManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KafkaManagerError::ConsumerCreation(err) => write!(f, "failed to create kafka consumer: {err}"),
            KafkaManagerError::Subscription(err) => write!(f, "failed to subscribe to topic: {err}"),
            KafkaManagerError::Persistence(err) => write!(f, "failed to load broker sources: {err}"),
        }
    }
}

impl StdError for KafkaManagerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            KafkaManagerError::ConsumerCreation(err) | KafkaManagerError::Subscription(err) => Some(err),
            KafkaManagerError::Persistence(err) => Some(err),
        }
    }
}

impl From<operion_sources_core::error::PersistenceError> for KafkaManagerError {
    fn from(err: operion_sources_core::error::PersistenceError) -> Self {
        KafkaManagerError::Persistence(err)
    }
}
