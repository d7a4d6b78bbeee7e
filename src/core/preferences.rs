//! The last currency pair the user picked.

use crate::core::storage::{KeyValueStorage, PAIR_KEY, PersistenceError, get_json, put_json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: &str, to: &str) -> Self {
        CurrencyPair {
            from: from.trim().to_ascii_uppercase(),
            to: to.trim().to_ascii_uppercase(),
        }
    }

    pub fn swapped(&self) -> Self {
        CurrencyPair {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl Default for CurrencyPair {
    fn default() -> Self {
        CurrencyPair::new("EUR", "USD")
    }
}

pub struct PairPreferences {
    storage: Arc<dyn KeyValueStorage>,
}

impl PairPreferences {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        PairPreferences { storage }
    }

    /// The saved pair, or EUR→USD when nothing usable is saved. Codes are
    /// upper-cased whatever the stored casing.
    pub async fn load(&self) -> CurrencyPair {
        match get_json::<CurrencyPair>(self.storage.as_ref(), PAIR_KEY).await {
            Ok(Some(stored)) => {
                let pair = CurrencyPair::new(&stored.from, &stored.to);
                debug!(?pair, "Loaded saved currency pair");
                pair
            }
            Ok(None) => CurrencyPair::default(),
            Err(e @ PersistenceError::Corrupted { .. }) => {
                warn!("Discarding saved currency pair: {}", e);
                if let Err(e) = self.storage.remove(PAIR_KEY).await {
                    warn!("Failed to remove {}: {}", PAIR_KEY, e);
                }
                CurrencyPair::default()
            }
            Err(e) => {
                warn!("Failed to read saved currency pair: {}", e);
                CurrencyPair::default()
            }
        }
    }

    pub async fn save(&self, pair: &CurrencyPair) -> Result<(), PersistenceError> {
        put_json(self.storage.as_ref(), PAIR_KEY, pair).await
    }
}
