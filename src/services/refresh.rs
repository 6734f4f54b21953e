//! Staleness-driven refresh scheduling (stale-while-revalidate).
//!
//! Every read classifies the cached snapshot as Missing, Fresh, or
//! Stale. Missing blocks on one shared pipeline run; Fresh serves the
//! cache untouched; Stale serves the cache immediately and revalidates
//! in the background. A stale answer always beats added latency or an
//! error.

use crate::constants::{CACHE_KEY, STALE_THRESHOLD_HOURS};
use crate::models::PriceSnapshot;
use crate::services::{Aggregator, CacheStore};
use crate::sources::{fetch_all, SourceAdapter};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info};

/// Cache-key state as observed by one read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Fresh,
    Stale,
}

/// Pure classification over the cached `lastUpdate`; the scheduler and
/// the background worker share it.
pub fn classify(
    last_update: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_hours: i64,
) -> Freshness {
    match last_update {
        None => Freshness::Missing,
        Some(ts) => {
            if now.signed_duration_since(ts) <= Duration::hours(threshold_hours) {
                Freshness::Fresh
            } else {
                Freshness::Stale
            }
        }
    }
}

pub struct RefreshScheduler {
    store: CacheStore,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    /// Single-flight guard: one pipeline run at a time per process.
    /// Concurrent missing-state readers queue here and leave with the
    /// first runner's result via the double-check read.
    refresh_lock: TokioMutex<()>,
    refresh_count: AtomicU64,
}

impl RefreshScheduler {
    pub fn new(store: CacheStore, adapters: Vec<Arc<dyn SourceAdapter>>) -> Arc<Self> {
        Arc::new(Self {
            store,
            adapters,
            refresh_lock: TokioMutex::new(()),
            refresh_count: AtomicU64::new(0),
        })
    }

    /// Completed pipeline runs since startup
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    pub fn cache_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    /// Read the cached snapshot without triggering any refresh
    /// (the health surface).
    pub async fn peek(&self) -> Option<PriceSnapshot> {
        self.store.get_snapshot(CACHE_KEY).await
    }

    /// Serve a snapshot per the staleness state machine.
    pub async fn read(self: Arc<Self>) -> PriceSnapshot {
        match self.store.get_snapshot(CACHE_KEY).await {
            Some(cached) => {
                let state = classify(Some(cached.last_update), Utc::now(), STALE_THRESHOLD_HOURS);
                if state == Freshness::Stale {
                    debug!(last_update = %cached.last_update, "Cache stale, revalidating in background");
                    Arc::clone(&self).spawn_background_refresh();
                }
                cached
            }
            None => self.refresh_missing().await,
        }
    }

    /// Force one pipeline run regardless of cache state (the /update
    /// surface and the background worker).
    pub async fn force_refresh(&self) -> PriceSnapshot {
        let _guard = self.refresh_lock.lock().await;
        self.run_pipeline().await
    }

    /// Missing state: block on the pipeline, but share one in-flight
    /// run among concurrent callers. Whoever wins the lock fetches;
    /// everyone queued behind finds the freshly written value on the
    /// double-check read and serves that.
    async fn refresh_missing(&self) -> PriceSnapshot {
        let _guard = self.refresh_lock.lock().await;

        if let Some(cached) = self.store.get_snapshot(CACHE_KEY).await {
            return cached;
        }

        self.run_pipeline().await
    }

    /// Fire-and-forget revalidation. The triggering reader has already
    /// been answered; failures here are logged and dropped.
    fn spawn_background_refresh(self: Arc<Self>) {
        let scheduler = self;
        tokio::spawn(async move {
            let _guard = scheduler.refresh_lock.lock().await;

            // another reader's revalidation may have landed while queued
            if let Some(cached) = scheduler.store.get_snapshot(CACHE_KEY).await {
                let state = classify(Some(cached.last_update), Utc::now(), STALE_THRESHOLD_HOURS);
                if state == Freshness::Fresh {
                    debug!("Cache already revalidated, skipping");
                    return;
                }
            }

            scheduler.run_pipeline().await;
        });
    }

    /// fetch all sources -> merge -> best-effort set. Never fails: a
    /// refresh where every source broke still produces a valid, served
    /// (and cached) empty snapshot.
    async fn run_pipeline(&self) -> PriceSnapshot {
        let started = std::time::Instant::now();
        let outcomes = fetch_all(&self.adapters).await;
        let snapshot = Aggregator::merge(outcomes);

        let stored = self.store.set_snapshot(CACHE_KEY, &snapshot).await;
        self.refresh_count.fetch_add(1, Ordering::Relaxed);

        info!(
            ok_sources = snapshot.ok_source_count(),
            total_sources = snapshot.sources.len(),
            stored,
            duration_s = started.elapsed().as_secs_f64(),
            "Refresh pipeline finished"
        );

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CityQuotes, PriceQuote};
    use crate::sources::FetchError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for CountingSource {
        fn brand(&self) -> &'static str {
            "FAKE"
        }

        fn url(&self) -> &'static str {
            "https://fake.example.com"
        }

        fn expected_cities(&self) -> usize {
            1
        }

        async fn fetch(&self) -> Result<CityQuotes, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut out = BTreeMap::new();
            out.insert(
                "ANKARA".to_string(),
                PriceQuote::new(Some(41.0), Some(43.0), Some(25.0)),
            );
            Ok(out)
        }
    }

    fn scheduler_with_store(store: CacheStore) -> (Arc<RefreshScheduler>, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(CountingSource {
            fetches: fetches.clone(),
        })];
        (RefreshScheduler::new(store, adapters), fetches)
    }

    fn aged_snapshot(hours_old: i64) -> PriceSnapshot {
        PriceSnapshot {
            prices: BTreeMap::new(),
            averages: BTreeMap::new(),
            sources: vec![],
            last_update: Utc::now() - Duration::hours(hours_old),
            note: Some("seed".to_string()),
        }
    }

    async fn wait_for_refreshes(scheduler: &RefreshScheduler, expected: u64) {
        for _ in 0..500 {
            if scheduler.refresh_count() >= expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        panic!(
            "timed out waiting for {expected} refreshes (saw {})",
            scheduler.refresh_count()
        );
    }

    #[test]
    fn test_classify_states() {
        let now = Utc::now();
        assert_eq!(classify(None, now, 12), Freshness::Missing);
        assert_eq!(
            classify(Some(now - Duration::hours(1)), now, 12),
            Freshness::Fresh
        );
        // exactly at the threshold still counts as fresh
        assert_eq!(
            classify(Some(now - Duration::hours(12)), now, 12),
            Freshness::Fresh
        );
        assert_eq!(
            classify(Some(now - Duration::hours(13)), now, 12),
            Freshness::Stale
        );
    }

    #[tokio::test]
    async fn test_missing_state_fetches_synchronously() {
        let (scheduler, fetches) = scheduler_with_store(CacheStore::memory());

        let snapshot = scheduler.clone().read().await;
        assert!(snapshot.has_data());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // second read is a fresh cache hit, no new fetch
        let again = scheduler.clone().read().await;
        assert_eq!(again.last_update, snapshot.last_update);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_state_is_single_flighted() {
        let (scheduler, fetches) = scheduler_with_store(CacheStore::memory());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            handles.push(tokio::spawn(async move { scheduler.read().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().has_data());
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_served_unchanged_then_revalidated() {
        let store = CacheStore::memory();
        let seeded = aged_snapshot(13);
        store.set_snapshot(CACHE_KEY, &seeded).await;
        let (scheduler, fetches) = scheduler_with_store(store);

        // first read serves the 13h-old snapshot as-is
        let served = scheduler.clone().read().await;
        assert_eq!(served.last_update, seeded.last_update);
        assert_eq!(served.note.as_deref(), Some("seed"));

        // exactly one background pipeline runs
        wait_for_refreshes(&scheduler, 1).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // the next read sees the revalidated snapshot
        let fresh = scheduler.clone().read().await;
        assert!(fresh.last_update > seeded.last_update);
        assert!(fresh.has_data());
    }

    #[tokio::test]
    async fn test_fresh_snapshot_triggers_nothing() {
        let store = CacheStore::memory();
        store.set_snapshot(CACHE_KEY, &aged_snapshot(1)).await;
        let (scheduler, fetches) = scheduler_with_store(store);

        scheduler.clone().read().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_recomputes_every_read() {
        let (scheduler, fetches) = scheduler_with_store(CacheStore::Disabled);

        let first = scheduler.clone().read().await;
        let second = scheduler.clone().read().await;
        assert!(first.has_data());
        assert!(second.has_data());
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert!(scheduler.peek().await.is_none());
    }

    #[tokio::test]
    async fn test_force_refresh_overwrites_fresh_cache() {
        let store = CacheStore::memory();
        store.set_snapshot(CACHE_KEY, &aged_snapshot(1)).await;
        let (scheduler, fetches) = scheduler_with_store(store);

        let snapshot = scheduler.force_refresh().await;
        assert!(snapshot.has_data());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        let cached = scheduler.peek().await.unwrap();
        assert_eq!(cached.last_update, snapshot.last_update);
    }
}
