//! Environment-variable configuration loading.
//!
//! Plain `std::env::var` lookups with typed parsing errors — there is no
//! config file format in scope here, only the handful of variables each
//! orchestrator's `Initialize` step needs.

use crate::error::ConfigError;

/// Supported persistence URL schemes: both file and relational backends
/// are fully implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceScheme {
    File,
    Postgres,
    MySql,
    Sqlite,
}

/// Read a required environment variable, erroring with the variable's
/// name rather than a generic message.
pub fn required_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv(name))
}

/// Read an optional environment variable.
pub fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Parse a persistence URL's scheme out of a `<PROVIDER>_PERSISTENCE_URL`
/// value.
pub fn persistence_scheme(var: &'static str, url: &str) -> Result<PersistenceScheme, ConfigError> {
    let scheme = url.split("://").next().unwrap_or("");
    match scheme {
        "file" => Ok(PersistenceScheme::File),
        "postgres" | "postgresql" => Ok(PersistenceScheme::Postgres),
        "mysql" => Ok(PersistenceScheme::MySql),
        "sqlite" => Ok(PersistenceScheme::Sqlite),
        other => Err(ConfigError::InvalidUrlScheme {
            var,
            value: other.to_string(),
        }),
    }
}

/// Strip the `file://` scheme off a persistence URL, leaving the base
/// directory each provider's per-entity JSON file lives under.
pub fn file_base_path(url: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
}

/// Parse a `WEBHOOK_PORT`-style variable, defaulting when unset.
pub fn port_var(name: &'static str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidPort(value)),
        Err(_) => Ok(default),
    }
}

/// Load a `.env` file if present, ignoring its absence. Additive only —
/// never required for correct operation.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_required_var_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("OPERION_TEST_MISSING");
        let err = required_var("OPERION_TEST_MISSING").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("OPERION_TEST_MISSING")));
    }

    #[test]
    fn recognizes_all_supported_schemes() {
        assert_eq!(
            persistence_scheme("X", "file:///tmp/data").unwrap(),
            PersistenceScheme::File
        );
        assert_eq!(
            persistence_scheme("X", "postgres://localhost/db").unwrap(),
            PersistenceScheme::Postgres
        );
        assert_eq!(
            persistence_scheme("X", "postgresql://localhost/db").unwrap(),
            PersistenceScheme::Postgres
        );
        assert_eq!(
            persistence_scheme("X", "mysql://localhost/db").unwrap(),
            PersistenceScheme::MySql
        );
        assert_eq!(
            persistence_scheme("X", "sqlite://data.db").unwrap(),
            PersistenceScheme::Sqlite
        );
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = persistence_scheme("X", "redis://localhost").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrlScheme { .. }));
    }

    #[test]
    fn port_var_defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("OPERION_TEST_PORT");
        assert_eq!(port_var("OPERION_TEST_PORT", 8080).unwrap(), 8080);
    }

    #[test]
    fn file_base_path_strips_scheme() {
        assert_eq!(file_base_path("file:///var/operion/sources").to_str().unwrap(), "/var/operion/sources");
        assert_eq!(file_base_path("/already/bare").to_str().unwrap(), "/already/bare");
    }

    #[test]
    fn port_var_rejects_non_numeric() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("OPERION_TEST_PORT", "not-a-port");
        let err = port_var("OPERION_TEST_PORT", 8080).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)));
        std::env::remove_var("OPERION_TEST_PORT");
    }
}
