use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use super::util::with_retry;
use crate::core::rates::{FetchedRates, RateFetchError, RateSource, RateTable};

/// Rate source for `exchangerate-api.com` style endpoints:
/// `GET {base_url}/latest/{BASE}`.
pub struct ExchangeRateApiSource {
    base_url: String,
    client: reqwest::Client,
    retries: usize,
    retry_delay_ms: u64,
}

impl ExchangeRateApiSource {
    pub fn new(base_url: &str) -> Result<Self, RateFetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shopper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RateFetchError::Network(e.to_string()))?;
        Ok(ExchangeRateApiSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retries: 0,
            retry_delay_ms: 0,
        })
    }

    pub fn with_retries(mut self, retries: usize, retry_delay_ms: u64) -> Self {
        self.retries = retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    async fn fetch_once(&self, url: &str, base: &str) -> Result<FetchedRates, RateFetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RateFetchError::Network(format!("{e} for URL: {url}")))?;

        if !response.status().is_success() {
            return Err(RateFetchError::Status(format!(
                "{} for base currency: {}",
                response.status(),
                base
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| RateFetchError::Network(e.to_string()))?;

        parse_latest(&text, base)
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: Option<BTreeMap<String, f64>>,
    time_last_updated: Option<i64>,
}

fn parse_latest(text: &str, base: &str) -> Result<FetchedRates, RateFetchError> {
    let data: LatestRatesResponse = serde_json::from_str(text).map_err(|e| {
        RateFetchError::Malformed(format!("Failed to parse JSON response for {base}: {e}"))
    })?;

    let rates = match data.rates {
        Some(rates) if !rates.is_empty() => rates,
        _ => {
            return Err(RateFetchError::Malformed(format!(
                "No rates found for base currency: {base}"
            )));
        }
    };

    let table = RateTable::new(base, rates)?;
    let source_updated_at: Option<DateTime<Utc>> = data
        .time_last_updated
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

    Ok(FetchedRates {
        table,
        source_updated_at,
    })
}

#[async_trait]
impl RateSource for ExchangeRateApiSource {
    #[instrument(name = "ExchangeRateFetch", skip(self), fields(base = %base))]
    async fn fetch_latest(&self, base: &str) -> Result<FetchedRates, RateFetchError> {
        let url = format!("{}/latest/{}", self.base_url, base);
        debug!("Requesting rate table from {}", url);

        let fetched = with_retry(
            || self.fetch_once(&url, base),
            self.retries,
            self.retry_delay_ms,
        )
        .await?;

        debug!(
            currencies = fetched.table.len(),
            "Received rate table for {}", base
        );
        Ok(fetched)
    }
}
