use crate::errors::{StorageError, StorageResult};
use async_trait::async_trait;
use log::warn;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

/// Async key-value persistence used for column customization.
///
/// Values are JSON blobs; backends decide how they are stored.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;
    async fn remove(&self, keys: &[String]) -> StorageResult<()>;
    async fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Process-local store, for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}

/// Store keeping the whole key space in a single JSON object file
pub struct JsonFileKeyValueStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl JsonFileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> StorageResult<Map<String, Value>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StorageError::read(&self.path.display().to_string(), e)),
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(
                    "Key-value file {} is corrupt, treating it as empty",
                    self.path.display()
                );
                Ok(Map::new())
            }
        }
    }

    async fn write_all(&self, map: Map<String, Value>) -> StorageResult<()> {
        let path = self.path.display().to_string();
        let body = serde_json::to_vec_pretty(&Value::Object(map))
            .map_err(|e| StorageError::write(&path, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::write(&path, e))?;
            }
        }

        // Readers only ever see a complete file
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, body)
            .await
            .map_err(|e| StorageError::write(&path, e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StorageError::write(&path, e))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileKeyValueStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value);
        self.write_all(map).await
    }

    async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        let before = map.len();
        for key in keys {
            map.remove(key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.write_all(map).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.keys().cloned().collect())
    }
}
