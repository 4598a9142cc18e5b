use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("Storage key {0:?} can not be mapped to a slot")]
    InvalidKey(String),
}

/// A flat key-value slot store. Each `set` replaces the whole value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Stores every key as its own JSON file under `root`.
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let file_stem: String = key
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();

        if file_stem.is_empty() {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }

        Ok(self.root.join(format!("{file_stem}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.slot_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        let tmp_path = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&tmp_path, value).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_returns_none_for_unknown_key() {
        let store = InMemoryKeyValueStore::new();

        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("present", b"[]".to_vec()).await.unwrap();
        assert_eq!(store.get("present").await.unwrap(), Some(b"[]".to_vec()));
    }

    #[tokio::test]
    async fn file_store_replaces_whole_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("nested"));

        assert_eq!(store.get("Alarms List").await.unwrap(), None);

        store.set("Alarms List", b"first".to_vec()).await.unwrap();
        store.set("Alarms List", b"second".to_vec()).await.unwrap();

        assert_eq!(
            store.get("Alarms List").await.unwrap(),
            Some(b"second".to_vec())
        );
        assert!(dir.path().join("nested/Alarms_List.json").exists());
        assert!(!dir.path().join("nested/Alarms_List.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_rejects_blank_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path());

        let result = store.set("   ", Vec::new()).await;

        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
