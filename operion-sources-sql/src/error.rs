//! Extension trait converting `sqlx::Error` into
//! `operion_sources_core::error::PersistenceError`, mirroring the
//! teacher's `SqlxErrorExt` orphan-rule workaround.

use operion_sources_core::error::PersistenceError;

pub trait SqlxErrorExt<T> {
    fn into_persistence_error(self) -> Result<T, PersistenceError>;
}

impl<T> SqlxErrorExt<T> for Result<T, sqlx::Error> {
    fn into_persistence_error(self) -> Result<T, PersistenceError> {
        self.map_err(PersistenceError::backend)
    }
}
