//! Generic JSON document-file store backing every provider's file
//! persistence adapter.
//!
//! One file per provider, holding a JSON array of rows, guarded by a
//! single `tokio::sync::RwLock` and written crash-atomically via
//! write-to-temp + `rename`.

use std::path::{Path, PathBuf};

use operion_sources_core::error::PersistenceError;
use operion_sources_core::model::Source;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

/// A JSON-array-backed file of rows of type `T`.
pub struct FileStore<T> {
    path: PathBuf,
    rows: RwLock<Vec<T>>,
}

impl<T> FileStore<T>
where
    T: Source + Serialize + DeserializeOwned + Clone,
{
    /// Open (creating if absent) the store at `path`. The parent directory
    /// is created with mode `0750` if missing; the file itself is created
    /// with mode `0600`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(PersistenceError::backend)?;
                set_permissions(parent, 0o750).await?;
            }
        }

        let rows = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(PersistenceError::serialization)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(PersistenceError::backend(err)),
        };

        let store = Self {
            path,
            rows: RwLock::new(rows),
        };
        store.flush_locked(&store.rows.read().await).await?;
        Ok(store)
    }

    pub async fn find_by_id(&self, id: &str) -> Option<T> {
        self.rows.read().await.iter().find(|r| r.id() == id).cloned()
    }

    pub async fn find_by_external_id(&self, external_id: uuid::Uuid) -> Option<T> {
        self.rows
            .read()
            .await
            .iter()
            .find(|r| r.external_id() == external_id)
            .cloned()
    }

    pub async fn find_all(&self) -> Vec<T> {
        self.rows.read().await.clone()
    }

    pub async fn find_all_active(&self) -> Vec<T> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|r| r.active())
            .cloned()
            .collect()
    }

    pub async fn find_where<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.rows.read().await.iter().filter(|r| predicate(r)).cloned().collect()
    }

    /// Insert `row`, or replace the existing row with the same `id`.
    pub async fn upsert(&self, row: T) -> Result<(), PersistenceError> {
        let mut rows = self.rows.write().await;
        match rows.iter().position(|r| r.id() == row.id()) {
            Some(idx) => rows[idx] = row,
            None => rows.push(row),
        }
        self.flush_locked(&rows).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let mut rows = self.rows.write().await;
        rows.retain(|r| r.id() != id);
        self.flush_locked(&rows).await
    }

    async fn flush_locked(&self, rows: &[T]) -> Result<(), PersistenceError> {
        let body = serde_json::to_vec_pretty(rows).map_err(PersistenceError::serialization)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(PersistenceError::backend)?;
        set_permissions(&tmp_path, 0o600).await?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(PersistenceError::backend)?;
        tracing::debug!(path = %self.path.display(), rows = rows.len(), "flushed file store");
        Ok(())
    }

    pub async fn health_check(&self) -> bool {
        tokio::fs::metadata(&self.path).await.is_ok()
    }
}

#[cfg(unix)]
async fn set_permissions(path: &Path, mode: u32) -> Result<(), PersistenceError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(mode);
    tokio::fs::set_permissions(path, perms)
        .await
        .map_err(PersistenceError::backend)
}

#[cfg(not(unix))]
async fn set_permissions(_path: &Path, _mode: u32) -> Result<(), PersistenceError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use operion_sources_core::model::WebhookSource;
    use serde_json::json;

    #[tokio::test]
    async fn roundtrips_through_a_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webhooks.json");
        let store: FileStore<WebhookSource> = FileStore::open(&path).await.unwrap();

        let source = WebhookSource::new("wh1", json!({})).unwrap();
        store.upsert(source.clone()).await.unwrap();

        let reopened: FileStore<WebhookSource> = FileStore::open(&path).await.unwrap();
        let found = reopened.find_by_id("wh1").await.unwrap();
        assert_eq!(found.id, "wh1");
        assert_eq!(found.external_id, source.external_id);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<WebhookSource> = FileStore::open(dir.path().join("w.json")).await.unwrap();
        let mut source = WebhookSource::new("wh1", json!({"v": 1})).unwrap();
        store.upsert(source.clone()).await.unwrap();

        source.update_configuration(json!({"v": 2}));
        store.upsert(source.clone()).await.unwrap();

        let all = store.find_all_active().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].configuration, json!({"v": 2}));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<WebhookSource> = FileStore::open(dir.path().join("w.json")).await.unwrap();
        store.delete("missing").await.unwrap();
        let source = WebhookSource::new("wh1", json!({})).unwrap();
        store.upsert(source).await.unwrap();
        store.delete("wh1").await.unwrap();
        store.delete("wh1").await.unwrap();
        assert!(store.find_by_id("wh1").await.is_none());
    }

    #[tokio::test]
    async fn health_check_true_once_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<WebhookSource> = FileStore::open(dir.path().join("w.json")).await.unwrap();
        assert!(store.health_check().await);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn file_and_directory_permissions_are_restrictive() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        let path = sub.join("w.json");
        let _store: FileStore<WebhookSource> = FileStore::open(&path).await.unwrap();

        let file_mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = tokio::fs::metadata(&sub).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o750);
    }
}
