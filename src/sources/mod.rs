mod aytemiz;
mod opet;
mod petrol_ofisi;

pub use aytemiz::AytemizSource;
pub use opet::OpetSource;
pub use petrol_ofisi::PetrolOfisiSource;

use crate::constants::ADAPTER_TIMEOUT_SECS;
use crate::models::{BrandKey, CityQuotes};
use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};
use thiserror::Error as ThisError;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

/// Adapter-level failure. Always recorded as data in a `SourceResult`,
/// never propagated past the aggregator.
#[derive(ThisError, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream HTTP {0}")]
    Status(u16),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no rows recognized in upstream response")]
    NoData,

    #[error("adapter task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

/// One upstream price source. Implementations differ in how they reach
/// the upstream (page table, form-post archive, JSON API) but all
/// produce normalized city keys and validated prices.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Normalized brand key, e.g. `OPET`
    fn brand(&self) -> &'static str;

    /// Upstream URL recorded in quotes and source results
    fn url(&self) -> &'static str;

    /// Known size of this source's city domain, for coverage flagging
    fn expected_cities(&self) -> usize;

    async fn fetch(&self) -> Result<CityQuotes, FetchError>;
}

/// Result of one isolated adapter invocation
pub struct AdapterOutcome {
    pub brand: BrandKey,
    pub url: String,
    pub expected_cities: usize,
    pub result: Result<CityQuotes, FetchError>,
}

/// The enumerable adapter registry. Order is not meaningful; the
/// aggregator must not rely on it.
pub fn registry(http: &reqwest::Client) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(PetrolOfisiSource::new(http.clone())),
        Arc::new(OpetSource::new(http.clone())),
        Arc::new(AytemizSource::new(http.clone())),
    ]
}

/// Run every adapter concurrently, each behind its own timeout.
///
/// One adapter's failure or slowness never blocks or delays another's
/// result: each runs in its own task, and any internal failure (network,
/// parse, panic, timeout) comes back as a `FetchError`, never an early
/// return. A timed-out adapter's task is abandoned, not cancelled; it
/// may keep running to completion in the background.
pub async fn fetch_all(adapters: &[Arc<dyn SourceAdapter>]) -> Vec<AdapterOutcome> {
    fetch_all_with_timeout(adapters, Duration::from_secs(ADAPTER_TIMEOUT_SECS)).await
}

pub async fn fetch_all_with_timeout(
    adapters: &[Arc<dyn SourceAdapter>],
    per_adapter: Duration,
) -> Vec<AdapterOutcome> {
    let mut tasks = Vec::with_capacity(adapters.len());

    for adapter in adapters {
        let adapter = adapter.clone();
        tasks.push(tokio::spawn(async move {
            let started = std::time::Instant::now();

            let fetch_adapter = adapter.clone();
            let inner = tokio::spawn(async move { fetch_adapter.fetch().await });

            let result = match timeout(per_adapter, inner).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(FetchError::Task(join_err.to_string())),
                Err(_) => Err(FetchError::Timeout(per_adapter.as_secs())),
            };

            match &result {
                Ok(cities) => info!(
                    brand = adapter.brand(),
                    cities = cities.len(),
                    duration_s = started.elapsed().as_secs_f64(),
                    "Adapter fetch completed"
                ),
                Err(e) => warn!(
                    brand = adapter.brand(),
                    error = %e,
                    duration_s = started.elapsed().as_secs_f64(),
                    "Adapter fetch failed"
                ),
            }

            AdapterOutcome {
                brand: adapter.brand().to_string(),
                url: adapter.url().to_string(),
                expected_cities: adapter.expected_cities(),
                result,
            }
        }));
    }

    let joined = join_all(tasks).await;

    joined
        .into_iter()
        .zip(adapters)
        .map(|(task_result, adapter)| match task_result {
            Ok(outcome) => outcome,
            Err(join_err) => AdapterOutcome {
                brand: adapter.brand().to_string(),
                url: adapter.url().to_string(),
                expected_cities: adapter.expected_cities(),
                result: Err(FetchError::Task(join_err.to_string())),
            },
        })
        .collect()
}

/// Sliding-window rate limiter shared across an adapter's per-city
/// requests, so throughput is bounded by a budget instead of a
/// hardcoded sleep between calls.
#[derive(Debug)]
pub struct RateLimiter {
    request_timestamps: TokioMutex<Vec<SystemTime>>,
    requests_per_minute: u32,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            request_timestamps: TokioMutex::new(Vec::new()),
            requests_per_minute,
        }
    }

    /// Wait until a request slot is available, then claim it.
    pub async fn acquire(&self) {
        let now = SystemTime::now();
        let mut timestamps = self.request_timestamps.lock().await;

        timestamps.retain(|&stamp| {
            now.duration_since(stamp).unwrap_or(Duration::ZERO) < Duration::from_secs(60)
        });

        if timestamps.len() >= self.requests_per_minute as usize {
            if let Some(&oldest) = timestamps.first() {
                let wait = Duration::from_secs(60)
                    .saturating_sub(now.duration_since(oldest).unwrap_or(Duration::ZERO));
                if !wait.is_zero() {
                    // Drop the lock while sleeping so other tasks can check
                    drop(timestamps);
                    sleep(wait + Duration::from_millis(100)).await;
                    let mut timestamps = self.request_timestamps.lock().await;
                    timestamps.push(now);
                    return;
                }
            }
        }

        timestamps.push(now);
    }
}

static TABLE_ROW: OnceLock<Regex> = OnceLock::new();
static TABLE_CELL: OnceLock<Regex> = OnceLock::new();
static HTML_TAG: OnceLock<Regex> = OnceLock::new();

/// Extract `<td>` cell texts per `<tr>` row, tags stripped. Shared by
/// the HTML-scraping adapters; tolerant of attribute noise and line
/// breaks inside rows.
pub(crate) fn table_rows(html: &str) -> Vec<Vec<String>> {
    let row_re = TABLE_ROW
        .get_or_init(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("valid regex"));
    let cell_re = TABLE_CELL
        .get_or_init(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("valid regex"));

    row_re
        .captures_iter(html)
        .map(|row| {
            cell_re
                .captures_iter(&row[1])
                .map(|cell| strip_tags(&cell[1]))
                .collect()
        })
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect()
}

pub(crate) fn strip_tags(fragment: &str) -> String {
    let tag_re = HTML_TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    tag_re.replace_all(fragment, "").trim().to_string()
}
