//! Aytemiz archive scraper (form-post variant).
//!
//! The archive endpoint answers an ASP.NET form post with an HTML table
//! covering all province centers for a chosen date. Fuel type 1 carries
//! benzin + motorin, fuel type 2 carries LPG, so one fetch is two posts
//! merged into a single city map.

use super::{table_rows, FetchError, SourceAdapter};
use crate::models::{CityQuotes, PriceQuote};
use crate::utils::{normalize_key, parse_price};
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

const ARCHIVE_URL: &str = "https://www.aytemiz.com.tr/akaryakit-fiyatlari/arsiv-fiyat-listesi";

const FUEL_TYPE_DIESEL_GASOLINE: u8 = 1;
const FUEL_TYPE_LPG: u8 = 2;

pub struct AytemizSource {
    http: reqwest::Client,
}

impl AytemizSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn post_archive(&self, fuel_type: u8) -> Result<String, FetchError> {
        let date = Utc::now().format("%d.%m.%Y").to_string();
        let form = [
            ("ctl00$ContentPlaceHolder1$C002$txtDate", date.as_str()),
            // "0" selects every province
            ("ctl00$ContentPlaceHolder1$C002$selCities", "0"),
            (
                "ctl00$ContentPlaceHolder1$C002$rblFuelType",
                if fuel_type == FUEL_TYPE_LPG { "2" } else { "1" },
            ),
        ];

        let response = self.http.post(ARCHIVE_URL).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

/// Pass 1: benzin + motorin. Columns: city, benzin, (katkılı), motorin.
/// A row missing either price is an archive artifact and is skipped.
fn parse_fuel_table(html: &str, out: &mut CityQuotes) {
    for cells in table_rows(html) {
        if cells.len() < 4 {
            continue;
        }
        let city = normalize_key(&cells[0]);
        if city.is_empty() {
            continue;
        }
        let benzin = parse_price(&cells[1]);
        let motorin = parse_price(&cells[3]);
        if benzin.is_none() || motorin.is_none() {
            debug!(city = %city, "Aytemiz: skipping partial fuel row");
            continue;
        }
        out.insert(city, PriceQuote::new(benzin, motorin, None));
    }
}

/// Pass 2: LPG. Columns: city, lpg. Merged into quotes from pass 1;
/// an LPG-only city still gets a quote with null fuel fields.
fn parse_lpg_table(html: &str, out: &mut CityQuotes) {
    for cells in table_rows(html) {
        if cells.len() < 2 {
            continue;
        }
        let city = normalize_key(&cells[0]);
        if city.is_empty() {
            continue;
        }
        let Some(lpg) = parse_price(&cells[1]) else {
            continue;
        };
        out.entry(city)
            .or_insert_with(|| PriceQuote::new(None, None, None))
            .lpg = Some(lpg);
    }
}

#[async_trait]
impl SourceAdapter for AytemizSource {
    fn brand(&self) -> &'static str {
        "AYTEMIZ"
    }

    fn url(&self) -> &'static str {
        ARCHIVE_URL
    }

    fn expected_cities(&self) -> usize {
        crate::constants::PROVINCES.len()
    }

    async fn fetch(&self) -> Result<CityQuotes, FetchError> {
        let mut out = CityQuotes::new();

        let fuel_html = self.post_archive(FUEL_TYPE_DIESEL_GASOLINE).await?;
        parse_fuel_table(&fuel_html, &mut out);

        let lpg_html = self.post_archive(FUEL_TYPE_LPG).await?;
        parse_lpg_table(&lpg_html, &mut out);

        if out.is_empty() {
            return Err(FetchError::NoData);
        }

        Ok(out)
    }
}
