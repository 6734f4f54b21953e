//! Background cache warmer.
//!
//! Reads are what normally trigger revalidation; a long-lived server
//! with no traffic would otherwise serve an ever-staler snapshot to its
//! first visitor. This worker re-checks the cache on an interval and
//! refreshes when missing or stale, sharing the scheduler's
//! single-flight lock with read-triggered refreshes.

use crate::constants::{STALE_THRESHOLD_HOURS, WORKER_INTERVAL_SECS};
use crate::services::{classify, Freshness, RefreshScheduler};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub async fn run_refresh_worker(scheduler: Arc<RefreshScheduler>) {
    info!(
        interval_secs = WORKER_INTERVAL_SECS,
        stale_after_hours = STALE_THRESHOLD_HOURS,
        "Starting refresh worker"
    );

    let mut iteration_count = 0u64;

    loop {
        iteration_count += 1;

        let state = match scheduler.peek().await {
            Some(cached) => classify(Some(cached.last_update), Utc::now(), STALE_THRESHOLD_HOURS),
            None => Freshness::Missing,
        };

        match state {
            Freshness::Fresh => {
                info!(iteration = iteration_count, "Refresh worker: cache fresh, nothing to do");
            }
            Freshness::Missing | Freshness::Stale => {
                info!(
                    iteration = iteration_count,
                    state = ?state,
                    "Refresh worker: refreshing"
                );
                let snapshot = scheduler.force_refresh().await;
                if snapshot.has_data() {
                    info!(
                        iteration = iteration_count,
                        ok_sources = snapshot.ok_source_count(),
                        cities = snapshot.averages.len(),
                        "Refresh worker: refresh completed"
                    );
                } else {
                    // still cached and served; sources carry the errors
                    warn!(
                        iteration = iteration_count,
                        "Refresh worker: refresh produced no data"
                    );
                }
            }
        }

        sleep(Duration::from_secs(WORKER_INTERVAL_SECS)).await;
    }
}
