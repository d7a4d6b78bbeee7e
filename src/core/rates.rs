//! Exchange rate tables, snapshots and the remote rate source abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Failure to obtain a usable rate table from the remote source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateFetchError {
    #[error("Request error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Status(String),

    #[error("Malformed rate payload: {0}")]
    Malformed(String),

    #[error("Invalid rate table: {0}")]
    InvalidTable(String),

    #[error("Rate request timed out after {0:?}")]
    Timeout(Duration),
}

/// Rates of each currency relative to a single base currency.
///
/// Every rate is finite and positive, and the base itself is always present
/// with a rate of exactly 1.0. Conversions assume this base-relative shape:
/// `amount / rates[from] * rates[to]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRateTable")]
pub struct RateTable {
    base: String,
    rates: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct RawRateTable {
    base: String,
    rates: BTreeMap<String, f64>,
}

impl TryFrom<RawRateTable> for RateTable {
    type Error = RateFetchError;

    fn try_from(raw: RawRateTable) -> Result<Self, Self::Error> {
        RateTable::new(&raw.base, raw.rates)
    }
}

fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

impl RateTable {
    /// Validates and builds a table. A missing base entry is filled in with 1.0.
    pub fn new(base: &str, rates: BTreeMap<String, f64>) -> Result<Self, RateFetchError> {
        let base = normalize_code(base)
            .ok_or_else(|| RateFetchError::InvalidTable(format!("invalid base currency '{base}'")))?;

        let mut normalized = BTreeMap::new();
        for (code, rate) in rates {
            let code = normalize_code(&code).ok_or_else(|| {
                RateFetchError::InvalidTable(format!("invalid currency code '{code}'"))
            })?;
            if !rate.is_finite() || rate <= 0.0 {
                return Err(RateFetchError::InvalidTable(format!(
                    "rate for {code} must be positive, got {rate}"
                )));
            }
            normalized.insert(code, rate);
        }

        match normalized.get(&base) {
            Some(rate) if *rate != 1.0 => {
                return Err(RateFetchError::InvalidTable(format!(
                    "base currency {base} has rate {rate}, expected 1"
                )));
            }
            Some(_) => {}
            None => {
                normalized.insert(base.clone(), 1.0);
            }
        }

        Ok(Self {
            base,
            rates: normalized,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Rate of `code` relative to the base currency.
    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rates.contains_key(code)
    }

    /// Currency codes in alphabetical order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }

    /// Number of currencies, the base included. Never zero.
    pub(crate) fn len(&self) -> usize {
        self.rates.len()
    }
}

/// An immutable, timestamped rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub table: RateTable,
    pub fetched_at: DateTime<Utc>,
    /// When the remote source says it last updated the rates, if it says.
    pub source_updated_at: Option<DateTime<Utc>>,
}

/// Result of one fetch from a remote source.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRates {
    pub table: RateTable,
    pub source_updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetches the full table of rates relative to `base`.
    async fn fetch_latest(&self, base: &str) -> Result<FetchedRates, RateFetchError>;
}
