//! Keeps the current rate snapshot, falling back to the last persisted one when
//! the remote source is unreachable.

use crate::core::convert::effective_rate;
use crate::core::rates::{RateFetchError, RateSnapshot, RateSource, RateTable};
use crate::core::storage::{
    KeyValueStorage, PersistenceError, RATES_FETCHED_AT_KEY, RATES_SOURCE_UPDATED_AT_KEY,
    RATES_TABLE_KEY, get_json, put_json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// How a call to [`RateProvider::refresh`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// New rates were fetched and are now current.
    Fresh,
    /// The fetch failed; an older snapshot is still being served.
    Stale { error: RateFetchError },
    /// The fetch failed and nothing is cached.
    Unavailable { error: RateFetchError },
}

impl RefreshOutcome {
    pub fn error(&self) -> Option<&RateFetchError> {
        match self {
            RefreshOutcome::Fresh => None,
            RefreshOutcome::Stale { error } | RefreshOutcome::Unavailable { error } => Some(error),
        }
    }
}

/// The provider's current view of the rates.
#[derive(Debug, Clone, Default)]
pub struct SnapshotView {
    pub snapshot: Option<RateSnapshot>,
    /// True only when the snapshot came from the latest refresh attempt.
    pub fresh: bool,
    /// The error of the latest refresh attempt, if it failed.
    pub error: Option<RateFetchError>,
}

impl SnapshotView {
    pub fn table(&self) -> Option<&RateTable> {
        self.snapshot.as_ref().map(|s| &s.table)
    }

    pub fn is_stale(&self) -> bool {
        self.snapshot.is_some() && !self.fresh
    }
}

pub struct RateProvider {
    source: Arc<dyn RateSource>,
    storage: Arc<dyn KeyValueStorage>,
    base: String,
    timeout: Duration,
    state: RwLock<SnapshotView>,
}

impl RateProvider {
    pub fn new(
        source: Arc<dyn RateSource>,
        storage: Arc<dyn KeyValueStorage>,
        base: &str,
        timeout: Duration,
    ) -> Self {
        RateProvider {
            source,
            storage,
            base: base.to_ascii_uppercase(),
            timeout,
            state: RwLock::new(SnapshotView::default()),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Fetches a fresh table. Never fails: errors are recorded and the last
    /// known snapshot (in memory, else persisted) keeps being served.
    pub async fn refresh(&self) -> RefreshOutcome {
        let result = match tokio::time::timeout(self.timeout, self.source.fetch_latest(&self.base))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(RateFetchError::Timeout(self.timeout)),
        };

        match result {
            Ok(fetched) => {
                let snapshot = RateSnapshot {
                    table: fetched.table,
                    fetched_at: Utc::now(),
                    source_updated_at: fetched.source_updated_at,
                };
                if let Err(e) = self.persist(&snapshot).await {
                    warn!("Failed to persist rate table: {}", e);
                }

                info!(
                    currencies = snapshot.table.len(),
                    "Refreshed rates for base {}", self.base
                );
                let mut state = self.state.write().await;
                *state = SnapshotView {
                    snapshot: Some(snapshot),
                    fresh: true,
                    error: None,
                };
                RefreshOutcome::Fresh
            }
            Err(error) => {
                warn!("Rate refresh failed: {}", error);
                let needs_fallback = self.state.read().await.snapshot.is_none();
                let fallback = if needs_fallback {
                    self.load_persisted().await
                } else {
                    None
                };

                let mut state = self.state.write().await;
                if state.snapshot.is_none() {
                    state.snapshot = fallback;
                }
                state.fresh = false;
                state.error = Some(error.clone());

                if state.snapshot.is_some() {
                    debug!("Serving stale rates after failed refresh");
                    RefreshOutcome::Stale { error }
                } else {
                    RefreshOutcome::Unavailable { error }
                }
            }
        }
    }

    /// Loads the persisted snapshot without touching the network. Returns true
    /// if a snapshot is available afterwards.
    pub async fn load_cached(&self) -> bool {
        if self.state.read().await.snapshot.is_some() {
            return true;
        }
        let cached = self.load_persisted().await;

        let mut state = self.state.write().await;
        if state.snapshot.is_none() {
            state.snapshot = cached;
            state.fresh = false;
        }
        state.snapshot.is_some()
    }

    pub async fn current_snapshot(&self) -> SnapshotView {
        self.state.read().await.clone()
    }

    /// The from→to rate of the current snapshot.
    pub async fn rate(&self, from: &str, to: &str) -> Option<f64> {
        let state = self.state.read().await;
        state
            .snapshot
            .as_ref()
            .and_then(|s| effective_rate(from, to, &s.table))
    }

    /// Refreshes now and then every `period` until the handle is cancelled or
    /// dropped. A refresh already running when the handle is cancelled is left
    /// to finish.
    pub fn schedule_periodic_refresh(self: &Arc<Self>, period: Duration) -> RefreshHandle {
        let (cancel, mut cancelled) = watch::channel(false);
        let provider = Arc::clone(self);
        let period = period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            debug!("Periodic rate refresh stopped");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let outcome = provider.refresh().await;
                        debug!(?outcome, "Periodic rate refresh finished");
                    }
                }
            }
        });

        RefreshHandle { cancel, task }
    }

    async fn persist(&self, snapshot: &RateSnapshot) -> Result<(), PersistenceError> {
        put_json(self.storage.as_ref(), RATES_TABLE_KEY, &snapshot.table).await?;
        put_json(self.storage.as_ref(), RATES_FETCHED_AT_KEY, &snapshot.fetched_at).await?;
        put_json(
            self.storage.as_ref(),
            RATES_SOURCE_UPDATED_AT_KEY,
            &snapshot.source_updated_at,
        )
        .await
    }

    async fn load_persisted(&self) -> Option<RateSnapshot> {
        let table = match get_json::<RateTable>(self.storage.as_ref(), RATES_TABLE_KEY).await {
            Ok(Some(table)) => table,
            Ok(None) => {
                debug!("No persisted rate table");
                return None;
            }
            Err(e) => {
                warn!("Discarding persisted rate table: {}", e);
                self.purge().await;
                return None;
            }
        };

        let fetched_at =
            match get_json::<DateTime<Utc>>(self.storage.as_ref(), RATES_FETCHED_AT_KEY).await {
                Ok(Some(at)) => at,
                Ok(None) => DateTime::<Utc>::UNIX_EPOCH,
                Err(e) => {
                    warn!("Ignoring persisted fetch time: {}", e);
                    DateTime::<Utc>::UNIX_EPOCH
                }
            };

        let source_updated_at = get_json::<Option<DateTime<Utc>>>(
            self.storage.as_ref(),
            RATES_SOURCE_UPDATED_AT_KEY,
        )
        .await
        .unwrap_or_else(|e| {
            warn!("Ignoring persisted source update time: {}", e);
            None
        })
        .flatten();

        if table.base() != self.base {
            warn!(
                "Persisted rate table uses base {}, expected {}",
                table.base(),
                self.base
            );
            return None;
        }

        debug!(%fetched_at, "Loaded persisted rate table");
        Some(RateSnapshot {
            table,
            fetched_at,
            source_updated_at,
        })
    }

    async fn purge(&self) {
        for key in [
            RATES_TABLE_KEY,
            RATES_FETCHED_AT_KEY,
            RATES_SOURCE_UPDATED_AT_KEY,
        ] {
            if let Err(e) = self.storage.remove(key).await {
                warn!("Failed to remove {}: {}", key, e);
            }
        }
    }
}

/// Stops a periodic refresh started by [`RateProvider::schedule_periodic_refresh`].
/// Dropping the handle stops it too.
pub struct RefreshHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Prevents any further scheduled refresh.
    pub fn cancel(&self) {
        // The receiver is gone only if the task already ended.
        let _ = self.cancel.send(true);
    }

    /// Cancels and waits for the scheduling task, including a refresh in flight.
    pub async fn cancel_and_wait(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!("Periodic rate refresh task failed: {}", e);
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::FetchedRates;
    use crate::store::MemoryStorage;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::sleep;

    struct MockSource {
        rates: Vec<(&'static str, f64)>,
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
        updated_at: Option<DateTime<Utc>>,
    }

    impl MockSource {
        fn new(rates: Vec<(&'static str, f64)>) -> Self {
            Self {
                rates,
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay: Duration::ZERO,
                updated_at: None,
            }
        }

        fn failing() -> Self {
            let source = Self::new(vec![]);
            source.failing.store(true, Ordering::SeqCst);
            source
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn updated_at(mut self, at: DateTime<Utc>) -> Self {
            self.updated_at = Some(at);
            self
        }
    }

    #[async_trait]
    impl RateSource for MockSource {
        async fn fetch_latest(&self, base: &str) -> Result<FetchedRates, RateFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(RateFetchError::Network("connection refused".to_string()));
            }
            let rates: BTreeMap<String, f64> = self
                .rates
                .iter()
                .map(|(c, r)| (c.to_string(), *r))
                .collect();
            Ok(FetchedRates {
                table: RateTable::new(base, rates)?,
                source_updated_at: self.updated_at,
            })
        }
    }

    fn provider_with(source: Arc<MockSource>, storage: Arc<MemoryStorage>) -> RateProvider {
        RateProvider::new(source, storage, "USD", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_refresh_success_persists_snapshot() {
        let source = Arc::new(MockSource::new(vec![("EUR", 0.9)]));
        let storage = Arc::new(MemoryStorage::new());
        let provider = provider_with(source, Arc::clone(&storage));

        assert_eq!(provider.refresh().await, RefreshOutcome::Fresh);

        let view = provider.current_snapshot().await;
        assert!(view.fresh);
        assert!(view.error.is_none());
        assert_eq!(view.table().unwrap().get("EUR"), Some(0.9));
        assert!(storage.contains(RATES_TABLE_KEY).await);
        assert!(storage.contains(RATES_FETCHED_AT_KEY).await);
    }

    #[tokio::test]
    async fn test_refresh_failure_without_cache_is_unavailable() {
        let source = Arc::new(MockSource::failing());
        let provider = provider_with(source, Arc::new(MemoryStorage::new()));

        let outcome = provider.refresh().await;
        assert!(matches!(outcome, RefreshOutcome::Unavailable { .. }));

        let view = provider.current_snapshot().await;
        assert!(view.snapshot.is_none());
        assert!(!view.fresh);
        assert_eq!(
            view.error,
            Some(RateFetchError::Network("connection refused".to_string()))
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_snapshot() {
        let source = Arc::new(MockSource::new(vec![("EUR", 0.9)]));
        let provider = provider_with(Arc::clone(&source), Arc::new(MemoryStorage::new()));

        provider.refresh().await;
        let before = provider.current_snapshot().await.snapshot.unwrap();

        source.failing.store(true, Ordering::SeqCst);
        let outcome = provider.refresh().await;
        assert!(matches!(outcome, RefreshOutcome::Stale { .. }));

        let view = provider.current_snapshot().await;
        assert_eq!(view.snapshot, Some(before));
        assert!(view.is_stale());
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn test_refresh_failure_falls_back_to_persisted_table() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let online = provider_with(
                Arc::new(MockSource::new(vec![("EUR", 0.9)])),
                Arc::clone(&storage),
            );
            online.refresh().await;
        }

        let offline = provider_with(Arc::new(MockSource::failing()), storage);
        let outcome = offline.refresh().await;
        assert!(matches!(outcome, RefreshOutcome::Stale { .. }));

        let view = offline.current_snapshot().await;
        assert!(view.is_stale());
        assert_eq!(view.table().unwrap().get("EUR"), Some(0.9));
    }

    #[tokio::test]
    async fn test_fallback_keeps_source_update_time() {
        let storage = Arc::new(MemoryStorage::new());
        let updated = Utc.timestamp_opt(1730505601, 0).unwrap();
        provider_with(
            Arc::new(MockSource::new(vec![("EUR", 0.9)]).updated_at(updated)),
            Arc::clone(&storage),
        )
        .refresh()
        .await;
        assert!(storage.contains(RATES_SOURCE_UPDATED_AT_KEY).await);

        let offline = provider_with(Arc::new(MockSource::failing()), storage);
        offline.refresh().await;
        let snapshot = offline.current_snapshot().await.snapshot.unwrap();
        assert_eq!(snapshot.source_updated_at, Some(updated));
    }

    #[tokio::test]
    async fn test_corrupted_persisted_table_is_purged() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .put(RATES_TABLE_KEY, "{\"base\":".to_string())
            .await
            .unwrap();

        let provider = provider_with(Arc::new(MockSource::failing()), Arc::clone(&storage));
        let outcome = provider.refresh().await;

        assert!(matches!(outcome, RefreshOutcome::Unavailable { .. }));
        assert!(!storage.contains(RATES_TABLE_KEY).await);
    }

    #[tokio::test]
    async fn test_refresh_times_out() {
        let source = Arc::new(MockSource::new(vec![("EUR", 0.9)]).with_delay(Duration::from_secs(5)));
        let provider = RateProvider::new(
            source,
            Arc::new(MemoryStorage::new()),
            "USD",
            Duration::from_millis(20),
        );

        let outcome = provider.refresh().await;
        assert_eq!(
            outcome.error(),
            Some(&RateFetchError::Timeout(Duration::from_millis(20)))
        );
    }

    #[tokio::test]
    async fn test_load_cached_and_rate() {
        let storage = Arc::new(MemoryStorage::new());
        provider_with(
            Arc::new(MockSource::new(vec![("EUR", 0.8), ("GBP", 0.5)])),
            Arc::clone(&storage),
        )
        .refresh()
        .await;

        let provider = provider_with(Arc::new(MockSource::failing()), storage);
        assert!(provider.rate("EUR", "GBP").await.is_none());
        assert!(provider.load_cached().await);
        assert!(!provider.current_snapshot().await.fresh);
        assert_eq!(provider.rate("EUR", "GBP").await, Some(0.625));
    }

    #[tokio::test]
    async fn test_periodic_refresh_stops_after_cancel() {
        let source = Arc::new(MockSource::new(vec![("EUR", 0.9)]));
        let provider = Arc::new(provider_with(
            Arc::clone(&source),
            Arc::new(MemoryStorage::new()),
        ));

        let handle = provider.schedule_periodic_refresh(Duration::from_millis(20));
        sleep(Duration::from_millis(90)).await;
        handle.cancel_and_wait().await;

        let calls = source.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "expected repeated refreshes, got {calls}");

        sleep(Duration::from_millis(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_cancel_does_not_abort_refresh_in_flight() {
        let source =
            Arc::new(MockSource::new(vec![("EUR", 0.9)]).with_delay(Duration::from_millis(50)));
        let provider = Arc::new(provider_with(
            Arc::clone(&source),
            Arc::new(MemoryStorage::new()),
        ));

        let handle = provider.schedule_periodic_refresh(Duration::from_secs(3600));
        sleep(Duration::from_millis(10)).await;
        handle.cancel_and_wait().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let view = provider.current_snapshot().await;
        assert!(view.fresh);
        assert!(view.snapshot.is_some());
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_refresh() {
        let source = Arc::new(MockSource::new(vec![("EUR", 0.9)]));
        let provider = Arc::new(provider_with(
            Arc::clone(&source),
            Arc::new(MemoryStorage::new()),
        ));

        drop(provider.schedule_periodic_refresh(Duration::from_millis(10)));
        sleep(Duration::from_millis(60)).await;
        assert!(source.calls.load(Ordering::SeqCst) <= 1);
    }
}
