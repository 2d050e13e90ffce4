//! Error taxonomy for the event-source provider core.
//!
//! Each category gets its own enum rather than one grab-bag error. None
//! of these derive `thiserror`; `Display`/`Error` are implemented by hand.

use std::error::Error as StdError;
use std::fmt;

/// Errors constructing or mutating a logical source.
#[derive(Debug)]
pub enum ModelError {
    EmptyId,
    MissingField(&'static str),
    InvalidCron(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptyId => write!(f, "source id must not be empty"),
            ModelError::MissingField(name) => write!(f, "configuration missing required field '{name}'"),
            ModelError::InvalidCron(expr) => write!(f, "invalid cron expression: '{expr}'"),
        }
    }
}

impl StdError for ModelError {}

/// Startup configuration errors: missing env vars, bad URL schemes, bad ports.
#[derive(Debug)]
pub enum ConfigError {
    MissingEnv(&'static str),
    InvalidUrlScheme { var: &'static str, value: String },
    InvalidPort(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnv(name) => write!(f, "missing required environment variable '{name}'"),
            ConfigError::InvalidUrlScheme { var, value } => {
                write!(f, "environment variable '{var}' has unsupported URL scheme: '{value}'")
            }
            ConfigError::InvalidPort(value) => write!(f, "invalid port value: '{value}'"),
        }
    }
}

impl StdError for ConfigError {}

/// Persistence adapter errors.
///
/// `ById`/`ByExternalId` lookups never construct [`PersistenceError::NotFound`]
/// for a missing row — that's `Ok(None)`, not an error.
#[derive(Debug)]
pub enum PersistenceError {
    NotFound(String),
    Backend(Box<dyn StdError + Send + Sync>),
    Serialization(Box<dyn StdError + Send + Sync>),
    Other(String),
}

impl PersistenceError {
    pub fn backend(err: impl StdError + Send + Sync + 'static) -> Self {
        PersistenceError::Backend(Box::new(err))
    }

    pub fn serialization(err: impl StdError + Send + Sync + 'static) -> Self {
        PersistenceError::Serialization(Box::new(err))
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::NotFound(id) => write!(f, "no record found for id '{id}'"),
            PersistenceError::Backend(err) => write!(f, "persistence backend error: {err}"),
            PersistenceError::Serialization(err) => write!(f, "persistence serialization error: {err}"),
            PersistenceError::Other(msg) => write!(f, "persistence error: {msg}"),
        }
    }
}

impl StdError for PersistenceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PersistenceError::Backend(err) | PersistenceError::Serialization(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// JSON Schema validation failures.
///
/// Carries every failing field/message pair, not just the first — callers
/// need the full list to report a useful error back to the API client.
#[derive(Debug)]
pub struct ValidationError {
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: {}", self.messages.join("; "))
    }
}

impl StdError for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_messages() {
        let err = ValidationError::new(vec!["a is required".into(), "b must be a string".into()]);
        assert_eq!(err.to_string(), "validation failed: a is required; b must be a string");
    }

    #[test]
    fn persistence_not_found_is_not_an_error_path_for_lookups() {
        // Constructible, but repository lookups return Ok(None) instead of this —
        // see operion_sources_core::repository doc comments.
        let err = PersistenceError::NotFound("abc".into());
        assert_eq!(err.to_string(), "no record found for id 'abc'");
    }
}
