use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{RecordStore, StoreError};

const EXTENSION: &str = "json";

/// One JSON document per key at `<base>/<category>/<id>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn category_dir(&self, category: &str) -> PathBuf {
        self.base_dir.join(category)
    }

    fn document_path(&self, category: &str, id: &str) -> PathBuf {
        self.category_dir(category).join(format!("{id}.{EXTENSION}"))
    }

    fn not_found(category: &str, id: &str) -> StoreError {
        StoreError::NotFound { category: category.to_string(), id: id.to_string() }
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn list(&self, category: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(self.category_dir(category)).await {
            Ok(entries) => entries,
            // Nothing was ever created in this category
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();

        Ok(ids)
    }

    async fn read(&self, category: &str, id: &str) -> Result<Value, StoreError> {
        let raw = match fs::read_to_string(self.document_path(category, id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Self::not_found(category, id)),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&raw)?)
    }

    async fn update(&self, category: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.document_path(category, id);
        if !fs::try_exists(&path).await? {
            return Err(Self::not_found(category, id));
        }

        // Write beside the document, then swap it in
        let staging = path.with_extension(format!("{EXTENSION}.tmp"));
        let body = serde_json::to_vec(record)?;
        let mut file = fs::File::create(&staging).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(category, id, "Record updated");
        Ok(())
    }

    async fn create(&self, category: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        fs::create_dir_all(self.category_dir(category)).await?;

        let body = serde_json::to_vec(record)?;
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.document_path(category, id))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists {
                    category: category.to_string(),
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&body).await?;
        file.sync_all().await?;

        Ok(())
    }

    async fn delete(&self, category: &str, id: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.document_path(category, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Self::not_found(category, id)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CHECKS;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_read_list() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.create(CHECKS, "b", &json!({ "n": 2 })).await.unwrap();
        store.create(CHECKS, "a", &json!({ "n": 1 })).await.unwrap();

        assert_eq!(store.list(CHECKS).await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.read(CHECKS, "a").await.unwrap(), json!({ "n": 1 }));
    }

    #[tokio::test]
    async fn test_list_of_missing_category_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.list(CHECKS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let err = store.read(CHECKS, "gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_replaces_existing_only() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let err = store.update(CHECKS, "x", &json!({})).await.unwrap_err();
        assert!(err.is_not_found());

        store.create(CHECKS, "x", &json!({ "state": "down" })).await.unwrap();
        store.update(CHECKS, "x", &json!({ "state": "up" })).await.unwrap();

        assert_eq!(store.read(CHECKS, "x").await.unwrap(), json!({ "state": "up" }));
        assert_eq!(store.list(CHECKS).await.unwrap(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_create_is_exclusive() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.create(CHECKS, "x", &json!({ "v": 1 })).await.unwrap();
        let err = store.create(CHECKS, "x", &json!({ "v": 2 })).await.unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.read(CHECKS, "x").await.unwrap(), json!({ "v": 1 }));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.create(CHECKS, "x", &json!({})).await.unwrap();
        store.delete(CHECKS, "x").await.unwrap();

        assert!(store.delete(CHECKS, "x").await.unwrap_err().is_not_found());
        assert!(store.list(CHECKS).await.unwrap().is_empty());
    }
}
