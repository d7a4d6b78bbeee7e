//! Durable key-value storage abstractions

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Key holding the last successfully fetched rate table.
pub const RATES_TABLE_KEY: &str = "rates.table";
/// Key holding the time of the last successful rate fetch.
pub const RATES_FETCHED_AT_KEY: &str = "rates.fetched_at";
/// Key holding the source's own update time for the last fetched table.
pub const RATES_SOURCE_UPDATED_AT_KEY: &str = "rates.source_updated_at";
/// Key holding the serialized conversion history.
pub const HISTORY_KEY: &str = "history";
/// Key holding the last selected currency pair.
pub const PAIR_KEY: &str = "preferences.pair";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to read or write a persisted value.
///
/// Persistence failures are advisory: callers keep their in-memory state and
/// report the error instead of propagating it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Failed to access storage: {0}")]
    Backend(String),

    #[error("Failed to serialize value for {key}: {reason}")]
    Serialize { key: String, reason: String },

    #[error("Corrupted value for {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

impl From<StorageError> for PersistenceError {
    fn from(e: StorageError) -> Self {
        PersistenceError::Backend(e.to_string())
    }
}

/// A flat, string-valued store. Values are JSON text.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn put(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Serializes `value` as JSON and writes it under `key`.
pub async fn put_json<T: Serialize + ?Sized>(
    storage: &dyn KeyValueStorage,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let text = serde_json::to_string(value).map_err(|e| PersistenceError::Serialize {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    storage.put(key, text).await?;
    Ok(())
}

/// Reads and parses the JSON value under `key`.
///
/// A value that does not parse is reported as [`PersistenceError::Corrupted`];
/// the caller decides whether to purge it.
pub async fn get_json<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    match storage.get(key).await? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupted {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    #[tokio::test]
    async fn test_json_helpers_round_trip_and_detect_corruption() {
        let storage = MemoryStorage::new();

        put_json(&storage, "numbers", &vec![1, 2, 3]).await.unwrap();
        let numbers: Option<Vec<i32>> = get_json(&storage, "numbers").await.unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        let missing: Option<Vec<i32>> = get_json(&storage, "missing").await.unwrap();
        assert!(missing.is_none());

        storage.put("broken", "{not json".to_string()).await.unwrap();
        let result: Result<Option<Vec<i32>>, _> = get_json(&storage, "broken").await;
        assert!(matches!(
            result,
            Err(PersistenceError::Corrupted { ref key, .. }) if key == "broken"
        ));
    }
}
