use crate::core::storage::{KeyValueStorage, StorageError};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION_NAME: &str = "shopper";

impl From<fjall::Error> for StorageError {
    fn from(e: fjall::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// Durable storage in a fjall keyspace. Every write is synced before returning.
pub struct DiskStorage {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskStorage {
    pub fn open(data_path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_path)?;

        let keyspace = fjall::Config::new(data_path.join("store")).open()?;
        let partition = keyspace.open_partition(PARTITION_NAME, PartitionCreateOptions::default())?;
        debug!("Opened disk storage at {}", data_path.display());
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn sync(&self) -> Result<(), StorageError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for DiskStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.partition.get(key)? {
            Some(bytes) => {
                debug!("Storage HIT for key: {}", key);
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| StorageError::Backend(format!("Invalid UTF-8 under {key}: {e}")))?;
                Ok(Some(text))
            }
            None => {
                debug!("Storage MISS for key: {}", key);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.partition.insert(key, value)?;
        self.sync()?;
        debug!("Storage PUT for key: {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.partition.remove(key)?;
        self.sync()?;
        debug!("Storage REMOVE for key: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_disk_storage_get_put() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).unwrap();

        // Initially, storage is empty
        assert!(storage.get("key1").await.unwrap().is_none());

        storage.put("key1", "[1,2]".to_string()).await.unwrap();
        assert_eq!(storage.get("key1").await.unwrap().as_deref(), Some("[1,2]"));

        assert!(storage.get("key2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_storage_remove() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).unwrap();

        storage.put("key1", "123".to_string()).await.unwrap();
        storage.remove("key1").await.unwrap();
        assert!(storage.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_storage_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let storage = DiskStorage::open(dir.path()).unwrap();
            storage.put("history", "[]".to_string()).await.unwrap();
        }

        let reopened = DiskStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.get("history").await.unwrap().as_deref(), Some("[]"));
    }
}
