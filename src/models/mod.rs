mod snapshot;

pub use snapshot::{FuelAverages, PriceQuote, PriceSnapshot, SourceResult};

use std::collections::BTreeMap;

/// Canonical city identifier produced by `utils::normalize_key`
pub type CityKey = String;

/// Canonical brand identifier produced by `utils::normalize_key`
pub type BrandKey = String;

/// One adapter's output: per-city quotes for a single brand
pub type CityQuotes = BTreeMap<CityKey, PriceQuote>;
