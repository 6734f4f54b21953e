use super::{BrandKey, CityKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One brand's quote for one city. All three fuel fields are
/// independently optional; an all-`None` quote is valid ("no data yet").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub benzin: Option<f64>,
    pub motorin: Option<f64>,
    pub lpg: Option<f64>,
    /// Upstream URL the quote came from
    #[serde(default)]
    pub source: Option<String>,
    #[serde(rename = "fetchedAt", default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl PriceQuote {
    /// Bare quote as produced inside an adapter; the aggregator stamps
    /// `source`/`fetched_at` when merging.
    pub fn new(benzin: Option<f64>, motorin: Option<f64>, lpg: Option<f64>) -> Self {
        Self {
            benzin,
            motorin,
            lpg,
            source: None,
            fetched_at: None,
        }
    }
}

/// Outcome of one adapter invocation. Always produced, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    pub brand: BrandKey,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "cityCount", default, skip_serializing_if = "Option::is_none")]
    pub city_count: Option<usize>,
    /// Source answered but with materially fewer cities than its known
    /// domain size; merged anyway, flagged so averaging isn't silently
    /// under-weighted.
    #[serde(rename = "lowCoverage", default, skip_serializing_if = "std::ops::Not::not")]
    pub low_coverage: bool,
}

/// Per-city arithmetic means across contributing brands. A field with no
/// contributing brand stays `None`, never 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelAverages {
    pub benzin: Option<f64>,
    pub motorin: Option<f64>,
    pub lpg: Option<f64>,
}

/// One immutable, fully-formed aggregation result, cached as a unit.
///
/// A refresh builds a brand-new snapshot that replaces the cached value
/// wholesale; nothing ever edits a cached snapshot in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// brand -> city -> quote, all keys normalized
    pub prices: BTreeMap<BrandKey, BTreeMap<CityKey, PriceQuote>>,
    #[serde(default)]
    pub averages: BTreeMap<CityKey, FuelAverages>,
    #[serde(default)]
    pub sources: Vec<SourceResult>,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PriceSnapshot {
    pub fn has_data(&self) -> bool {
        self.prices.values().any(|cities| !cities.is_empty())
    }

    /// Number of sources that answered on the last refresh
    pub fn ok_source_count(&self) -> usize {
        self.sources.iter().filter(|s| s.ok).count()
    }
}
