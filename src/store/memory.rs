use crate::core::storage::{KeyValueStorage, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory storage backed by a HashMap. Nothing survives the process.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` currently holds a value.
    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.contains_key(key)
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.inner.lock().await;
        let value = values.get(key).cloned();
        if value.is_some() {
            debug!("Storage HIT for key: {}", key);
        } else {
            debug!("Storage MISS for key: {}", key);
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut values = self.inner.lock().await;
        debug!("Storage PUT for key: {}", key);
        values.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.inner.lock().await;
        values.remove(key);
        debug!("Storage REMOVE for key: {}", key);
        Ok(())
    }
}
