//! Core business logic abstractions

pub mod config;
pub mod convert;
pub mod currency;
pub mod ledger;
pub mod log;
pub mod preferences;
pub mod provider;
pub mod rates;
pub mod storage;

// Re-export main types for cleaner imports
pub use convert::{convert, convert_amount, effective_rate};
pub use ledger::{ConversionEntry, ConversionLedger, EntryPatch, LedgerUpdate, Photo, PhotoSlot};
pub use preferences::{CurrencyPair, PairPreferences};
pub use provider::{RateProvider, RefreshHandle, RefreshOutcome, SnapshotView};
pub use rates::{FetchedRates, RateFetchError, RateSnapshot, RateSource, RateTable};
pub use storage::{KeyValueStorage, PersistenceError, StorageError};
