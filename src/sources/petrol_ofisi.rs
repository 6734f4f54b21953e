//! Petrol Ofisi page-table scraper (one page per province).
//!
//! There is no bulk endpoint; each province has its own price page with
//! a district table whose first row is the province center. That means
//! 81 sequential requests per fetch, paced by the shared rate limiter
//! so a refresh never hammers the upstream.

use super::{table_rows, FetchError, RateLimiter, SourceAdapter};
use crate::constants::{CITY_REQUESTS_PER_MINUTE, PROVINCES};
use crate::models::{CityQuotes, PriceQuote};
use crate::utils::parse_price;
use async_trait::async_trait;
use tracing::debug;

const BASE_URL: &str = "https://www.petrolofisi.com.tr/akaryakit-fiyatlari";

/// Consecutive request failures before the whole adapter gives up;
/// scattered per-city failures are skipped instead.
const MAX_CONSECUTIVE_FAILURES: usize = 5;

pub struct PetrolOfisiSource {
    http: reqwest::Client,
    limiter: RateLimiter,
}

impl PetrolOfisiSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(CITY_REQUESTS_PER_MINUTE),
        }
    }

    fn city_page_url(province: &str) -> String {
        // page slugs are the lowercase ASCII province names
        format!("{}/{}-akaryakit-fiyatlari", BASE_URL, province.to_lowercase())
    }

    async fn fetch_city_page(&self, province: &str) -> Result<String, FetchError> {
        self.limiter.acquire().await;

        let response = self.http.get(Self::city_page_url(province)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

/// Pull the province-center quote out of a district table. Columns:
/// district, benzin, motorin, lpg; the first row with at least one
/// parseable price wins (the center district is listed first).
fn parse_city_page(html: &str) -> Option<PriceQuote> {
    for cells in table_rows(html) {
        if cells.len() < 3 {
            continue;
        }
        let benzin = parse_price(&cells[1]);
        let motorin = parse_price(&cells[2]);
        let lpg = cells.get(3).and_then(|c| parse_price(c));

        if benzin.is_some() || motorin.is_some() || lpg.is_some() {
            return Some(PriceQuote::new(benzin, motorin, lpg));
        }
    }
    None
}

#[async_trait]
impl SourceAdapter for PetrolOfisiSource {
    fn brand(&self) -> &'static str {
        "PETROLOFISI"
    }

    fn url(&self) -> &'static str {
        BASE_URL
    }

    fn expected_cities(&self) -> usize {
        PROVINCES.len()
    }

    async fn fetch(&self) -> Result<CityQuotes, FetchError> {
        let mut out = CityQuotes::new();
        let mut consecutive_failures = 0usize;
        let mut last_error = None;

        for &province in PROVINCES {
            match self.fetch_city_page(province).await {
                Ok(html) => {
                    consecutive_failures = 0;
                    match parse_city_page(&html) {
                        Some(quote) => {
                            out.insert(province.to_string(), quote);
                        }
                        None => {
                            debug!(city = province, "Petrol Ofisi: no price rows on page");
                        }
                    }
                }
                Err(e) => {
                    debug!(city = province, error = %e, "Petrol Ofisi: city page failed");
                    consecutive_failures += 1;
                    last_error = Some(e);
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        // the site is down, not a single flaky page
                        return Err(last_error.unwrap_or(FetchError::NoData));
                    }
                }
            }
        }

        if out.is_empty() {
            return Err(last_error.unwrap_or(FetchError::NoData));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_page_url_slug() {
        assert_eq!(
            PetrolOfisiSource::city_page_url("ISTANBUL"),
            "https://www.petrolofisi.com.tr/akaryakit-fiyatlari/istanbul-akaryakit-fiyatlari"
        );
    }

    #[test]
    fn test_parse_city_page_takes_center_row() {
        let html = r#"
            <table>
              <tr><th>İlçe</th><th>Benzin</th><th>Motorin</th><th>LPG</th></tr>
              <tr><td>Merkez</td><td>54,67 TL/LT</td><td>56,02 TL/LT</td><td>27,89 TL/LT</td></tr>
              <tr><td>Çukurova</td><td>54,70</td><td>56,05</td><td>27,91</td></tr>
            </table>"#;
        let quote = parse_city_page(html).unwrap();
        assert_eq!(quote.benzin, Some(54.67));
        assert_eq!(quote.motorin, Some(56.02));
        assert_eq!(quote.lpg, Some(27.89));
    }

    #[test]
    fn test_parse_city_page_without_lpg_column() {
        let html = r#"<tr><td>Merkez</td><td>54,67</td><td>56,02</td></tr>"#;
        let quote = parse_city_page(html).unwrap();
        assert_eq!(quote.benzin, Some(54.67));
        assert_eq!(quote.lpg, None);
    }

    #[test]
    fn test_parse_city_page_ignores_priceless_tables() {
        let html = r#"<tr><td>Merkez</td><td>-</td><td>yok</td></tr>"#;
        assert!(parse_city_page(html).is_none());
    }
}
