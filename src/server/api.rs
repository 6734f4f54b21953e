use crate::models::{PriceSnapshot, SourceResult};
use crate::server::AppState;
use crate::utils::normalize_key;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Query parameters for /prices. Filters are free text; they are
/// normalized before matching, so `?city=İstanbul` and `?city=ISTANBUL`
/// are the same query.
#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    pub city: Option<String>,
    pub brand: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    #[serde(rename = "hasData")]
    pub has_data: bool,
    #[serde(rename = "lastUpdate")]
    pub last_update: Option<DateTime<Utc>>,
    pub sources: Vec<SourceResult>,
    #[serde(rename = "cacheEnabled")]
    pub cache_enabled: bool,
    #[serde(rename = "uptimeSecs")]
    pub uptime_secs: u64,
    #[serde(rename = "refreshCount")]
    pub refresh_count: u64,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub snapshot: PriceSnapshot,
}

/// GET /health - cache and source state, never triggers a refresh
pub async fn health_handler(State(app_state): State<AppState>) -> Json<HealthResponse> {
    let cached = app_state.scheduler.peek().await;

    let (has_data, last_update, sources) = match cached {
        Some(snapshot) => (
            snapshot.has_data(),
            Some(snapshot.last_update),
            snapshot.sources,
        ),
        None => (false, None, vec![]),
    };

    Json(HealthResponse {
        ok: true,
        has_data,
        last_update,
        sources,
        cache_enabled: app_state.scheduler.cache_enabled(),
        uptime_secs: app_state.started_at.elapsed().as_secs(),
        refresh_count: app_state.scheduler.refresh_count(),
    })
}

/// GET /prices - full or filtered snapshot.
///
/// Serves per the staleness state machine: a cache hit is returned
/// immediately (with a background revalidation when stale), a miss
/// blocks on one shared pipeline run. Unknown cities/brands filter to
/// empty objects, never an error status.
pub async fn prices_handler(
    State(app_state): State<AppState>,
    Query(params): Query<PricesQuery>,
) -> Json<PriceSnapshot> {
    debug!(?params, "Prices query");
    let snapshot = app_state.scheduler.clone().read().await;

    let city = params
        .city
        .as_deref()
        .map(normalize_key)
        .filter(|k| !k.is_empty());
    let brand = params
        .brand
        .as_deref()
        .map(normalize_key)
        .filter(|k| !k.is_empty());

    Json(filter_snapshot(snapshot, city.as_deref(), brand.as_deref()))
}

/// GET|POST /update - force one synchronous refresh and return it
pub async fn update_handler(State(app_state): State<AppState>) -> Json<UpdateResponse> {
    info!("Forced refresh requested");
    let snapshot = app_state.scheduler.force_refresh().await;
    Json(UpdateResponse { ok: true, snapshot })
}

/// Narrow a snapshot to a city and/or brand scope. Keys are expected
/// normalized. An unmatched scope yields empty maps in an otherwise
/// intact snapshot.
fn filter_snapshot(
    snapshot: PriceSnapshot,
    city: Option<&str>,
    brand: Option<&str>,
) -> PriceSnapshot {
    let (city, brand) = match (city, brand) {
        (None, None) => return snapshot,
        scoped => scoped,
    };

    let mut out = snapshot;

    if let Some(brand_key) = brand {
        let kept = out.prices.remove(brand_key);
        out.prices = BTreeMap::from_iter(kept.map(|cities| (brand_key.to_string(), cities)));
    }

    if let Some(city_key) = city {
        for cities in out.prices.values_mut() {
            let kept = cities.remove(city_key);
            *cities = BTreeMap::from_iter(kept.map(|quote| (city_key.to_string(), quote)));
        }
        // brands with nothing for this city drop out entirely
        out.prices.retain(|_, cities| !cities.is_empty());

        let kept_avg = out.averages.remove(city_key);
        out.averages = BTreeMap::from_iter(kept_avg.map(|avg| (city_key.to_string(), avg)));
    }

    out
}
