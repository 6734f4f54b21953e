//! Opet JSON API client.
//!
//! Opet publishes per-province pump prices as JSON; no scraping needed,
//! but product names still have to be mapped onto the three fuel fields
//! and the amounts validated like any scraped value.

use super::{FetchError, SourceAdapter};
use crate::models::{CityQuotes, PriceQuote};
use crate::utils::{normalize_key, validate_price};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const API_URL: &str = "https://api.opet.com.tr/api/fuelprices/provinces";

pub struct OpetSource {
    http: reqwest::Client,
}

impl OpetSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct ProvincePrices {
    #[serde(rename = "provinceName")]
    province_name: String,
    #[serde(default)]
    prices: Vec<ProductPrice>,
}

#[derive(Debug, Deserialize)]
struct ProductPrice {
    #[serde(rename = "productName")]
    product_name: String,
    amount: f64,
}

/// Map Opet product names onto the snapshot's fuel fields. Unknown
/// products (marine fuels, additive variants) are ignored.
///
/// Names are matched on their diacritic-folded key form: upstream mixes
/// casings, and `str::to_lowercase` on dotted `İ` yields a combining
/// mark that breaks plain substring matching.
fn quote_from_products(products: &[ProductPrice]) -> PriceQuote {
    let mut quote = PriceQuote::new(None, None, None);

    for product in products {
        let name = normalize_key(&product.product_name);
        let Some(amount) = validate_price(product.amount) else {
            continue;
        };

        if quote.benzin.is_none() && (name.contains("BENZIN") || name.contains("KURSUNSUZ")) {
            quote.benzin = Some(amount);
        } else if quote.motorin.is_none() && name.contains("MOTORIN") {
            quote.motorin = Some(amount);
        } else if quote.lpg.is_none() && (name.contains("LPG") || name.contains("OTOGAZ")) {
            quote.lpg = Some(amount);
        }
    }

    quote
}

#[async_trait]
impl SourceAdapter for OpetSource {
    fn brand(&self) -> &'static str {
        "OPET"
    }

    fn url(&self) -> &'static str {
        API_URL
    }

    fn expected_cities(&self) -> usize {
        crate::constants::PROVINCES.len()
    }

    async fn fetch(&self) -> Result<CityQuotes, FetchError> {
        let response = self.http.get(API_URL).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let provinces: Vec<ProvincePrices> = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut out = CityQuotes::new();
        for province in &provinces {
            let city = normalize_key(&province.province_name);
            if city.is_empty() {
                continue;
            }
            let quote = quote_from_products(&province.prices);
            if quote.benzin.is_none() && quote.motorin.is_none() && quote.lpg.is_none() {
                debug!(city = %city, "Opet: province with no recognized products");
                continue;
            }
            out.insert(city, quote);
        }

        if out.is_empty() {
            return Err(FetchError::NoData);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_names_map_to_fuel_fields() {
        let products = vec![
            ProductPrice {
                product_name: "Kurşunsuz Benzin 95".to_string(),
                amount: 54.2,
            },
            ProductPrice {
                product_name: "Motorin EcoForce".to_string(),
                amount: 56.9,
            },
            ProductPrice {
                product_name: "Otogaz LPG".to_string(),
                amount: 27.1,
            },
            ProductPrice {
                product_name: "Denizcilik Yakıtı".to_string(),
                amount: 60.0,
            },
        ];

        let quote = quote_from_products(&products);
        assert_eq!(quote.benzin, Some(54.2));
        assert_eq!(quote.motorin, Some(56.9));
        assert_eq!(quote.lpg, Some(27.1));
    }

    #[test]
    fn test_all_caps_turkish_product_names_map() {
        // dotted İ must not defeat the matching
        let products = vec![
            ProductPrice {
                product_name: "KURŞUNSUZ BENZİN 95".to_string(),
                amount: 54.2,
            },
            ProductPrice {
                product_name: "MOTORİN".to_string(),
                amount: 56.9,
            },
            ProductPrice {
                product_name: "OTOGAZ".to_string(),
                amount: 27.1,
            },
        ];

        let quote = quote_from_products(&products);
        assert_eq!(quote.benzin, Some(54.2));
        assert_eq!(quote.motorin, Some(56.9));
        assert_eq!(quote.lpg, Some(27.1));
    }

    #[test]
    fn test_first_matching_product_wins() {
        let products = vec![
            ProductPrice {
                product_name: "Motorin".to_string(),
                amount: 56.9,
            },
            ProductPrice {
                product_name: "Motorin UltraForce".to_string(),
                amount: 58.4,
            },
        ];
        assert_eq!(quote_from_products(&products).motorin, Some(56.9));
    }

    #[test]
    fn test_invalid_amounts_are_dropped() {
        let products = vec![
            ProductPrice {
                product_name: "Benzin".to_string(),
                amount: 0.0,
            },
            ProductPrice {
                product_name: "Motorin".to_string(),
                amount: -1.0,
            },
        ];
        let quote = quote_from_products(&products);
        assert_eq!(quote.benzin, None);
        assert_eq!(quote.motorin, None);
    }

    #[test]
    fn test_province_payload_decodes() {
        let body = r#"[
            {"provinceName":"İSTANBUL","prices":[{"productName":"Kurşunsuz 95","amount":55.31}]},
            {"provinceName":"ANKARA"}
        ]"#;
        let provinces: Vec<ProvincePrices> = serde_json::from_str(body).unwrap();
        assert_eq!(provinces.len(), 2);
        assert_eq!(normalize_key(&provinces[0].province_name), "ISTANBUL");
        assert!(provinces[1].prices.is_empty());
    }
}
