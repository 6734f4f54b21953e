use crate::constants::LOW_COVERAGE_RATIO;
use crate::models::{BrandKey, CityKey, FuelAverages, PriceQuote, PriceSnapshot, SourceResult};
use crate::sources::AdapterOutcome;
use crate::utils::round2;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Service merging per-source quote maps into one snapshot.
///
/// Merging never fails: every adapter outcome becomes either a brand
/// entry in `prices` or an `ok:false` line in `sources`, and a refresh
/// where nothing succeeded still yields a valid (empty) snapshot.
pub struct Aggregator;

impl Aggregator {
    pub fn merge(outcomes: Vec<AdapterOutcome>) -> PriceSnapshot {
        let fetched_at = Utc::now();
        let mut prices: BTreeMap<BrandKey, BTreeMap<CityKey, PriceQuote>> = BTreeMap::new();
        let mut sources = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            match outcome.result {
                Ok(cities) => {
                    let city_count = cities.len();
                    let low_coverage =
                        (city_count as f64) < outcome.expected_cities as f64 * LOW_COVERAGE_RATIO;
                    if low_coverage {
                        warn!(
                            brand = %outcome.brand,
                            cities = city_count,
                            expected = outcome.expected_cities,
                            "Source answered with low city coverage"
                        );
                    }

                    let stamped: BTreeMap<CityKey, PriceQuote> = cities
                        .into_iter()
                        .map(|(city, mut quote)| {
                            quote.source = Some(outcome.url.clone());
                            quote.fetched_at = Some(fetched_at);
                            (city, quote)
                        })
                        .collect();
                    prices.insert(outcome.brand.clone(), stamped);

                    sources.push(SourceResult {
                        brand: outcome.brand,
                        ok: true,
                        url: Some(outcome.url),
                        error: None,
                        city_count: Some(city_count),
                        low_coverage,
                    });
                }
                Err(e) => {
                    sources.push(SourceResult {
                        brand: outcome.brand,
                        ok: false,
                        url: Some(outcome.url),
                        error: Some(e.to_string()),
                        city_count: None,
                        low_coverage: false,
                    });
                }
            }
        }

        let averages = Self::build_averages(&prices);
        let ok_count = sources.iter().filter(|s| s.ok).count();

        info!(
            ok_sources = ok_count,
            total_sources = sources.len(),
            cities = averages.len(),
            "Merged snapshot built"
        );

        PriceSnapshot {
            prices,
            averages,
            note: Some(format!(
                "{}/{} kaynak birleştirildi (il merkezleri)",
                ok_count,
                sources.len()
            )),
            sources,
            last_update: fetched_at,
        }
    }

    /// Per-city arithmetic mean over the non-null contributions of each
    /// fuel field, rounded to 2 decimals. A field nobody contributed
    /// stays `None` rather than becoming 0.
    fn build_averages(
        prices: &BTreeMap<BrandKey, BTreeMap<CityKey, PriceQuote>>,
    ) -> BTreeMap<CityKey, FuelAverages> {
        #[derive(Default)]
        struct Acc {
            sum: f64,
            count: u32,
        }

        impl Acc {
            fn add(&mut self, value: Option<f64>) {
                if let Some(v) = value {
                    self.sum += v;
                    self.count += 1;
                }
            }

            fn mean(&self) -> Option<f64> {
                (self.count > 0).then(|| round2(self.sum / self.count as f64))
            }
        }

        let mut sums: BTreeMap<&CityKey, (Acc, Acc, Acc)> = BTreeMap::new();
        for cities in prices.values() {
            for (city, quote) in cities {
                let entry = sums.entry(city).or_default();
                entry.0.add(quote.benzin);
                entry.1.add(quote.motorin);
                entry.2.add(quote.lpg);
            }
        }

        sums.into_iter()
            .map(|(city, (benzin, motorin, lpg))| {
                (
                    city.clone(),
                    FuelAverages {
                        benzin: benzin.mean(),
                        motorin: motorin.mean(),
                        lpg: lpg.mean(),
                    },
                )
            })
            .collect()
    }
}
