//! Price text parsing and currency conversion
//!
//! Scraped price strings arrive in every imaginable shape ("$1,500.50/month",
//! "EUR 1850", "Price on request"). Parsing is best-effort: anything that
//! cannot be recognized degrades to an absent field rather than an error.

use regex::Regex;
use std::sync::LazyLock;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9.]+").expect("static regex"));

/// Currency symbols, scanned in order; first match wins.
/// CAD has no unambiguous symbol and is matched by code only.
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[("$", "USD"), ("€", "EUR"), ("£", "GBP")];

/// Currency codes, scanned after symbols, case-insensitive.
const CURRENCY_CODES: &[&str] = &["USD", "EUR", "CAD", "GBP"];

/// Fixed conversion rates to USD
const USD_RATES: &[(&str, f64)] = &[
    ("USD", 1.00),
    ("EUR", 1.08),
    ("CAD", 0.73),
    ("GBP", 1.26),
];

/// Outcome of parsing a free-form price string
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedPrice {
    /// Numeric amount in the original currency
    pub amount: Option<f64>,
    /// ISO-like currency code
    pub currency: Option<String>,
}

/// Detect the currency of a price string
pub fn detect_currency(text: &str) -> Option<String> {
    for (symbol, code) in CURRENCY_SYMBOLS {
        if text.contains(symbol) {
            return Some((*code).to_string());
        }
    }

    let upper = text.to_uppercase();
    for code in CURRENCY_CODES {
        if upper.contains(code) {
            return Some((*code).to_string());
        }
    }

    None
}

/// Parse a free-form price string into an amount and a currency
pub fn parse_price(text: &str) -> ParsedPrice {
    let currency = detect_currency(text);

    let mut cleaned = text.to_string();

    for (symbol, _) in CURRENCY_SYMBOLS {
        cleaned = cleaned.replace(symbol, "");
    }
    for code in CURRENCY_CODES {
        cleaned = strip_case_insensitive(&cleaned, code);
    }
    cleaned = strip_case_insensitive(&cleaned, "/month");
    cleaned = strip_case_insensitive(&cleaned, "per month");
    cleaned = cleaned.replace(',', "");
    let cleaned = cleaned.trim();

    let amount = NUMBER_RE
        .find(cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok());

    ParsedPrice { amount, currency }
}

/// Convert an amount from the given currency to USD using the fixed table.
/// Unknown currency yields `None`.
pub fn convert_to_usd(amount: f64, currency: &str) -> Option<f64> {
    let upper = currency.to_uppercase();
    USD_RATES
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|(_, rate)| round_cents(amount * rate))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Remove every ASCII-case-insensitive occurrence of `needle` from
/// `haystack`. Byte positions are tracked on the original string, so
/// non-ASCII input cannot shift the offsets.
fn strip_case_insensitive(haystack: &str, needle: &str) -> String {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();

    let mut out = String::with_capacity(haystack.len());
    let mut pos = 0;

    while pos < hay.len() {
        if pos + needle.len() <= hay.len()
            && hay[pos..pos + needle.len()].eq_ignore_ascii_case(needle)
        {
            pos += needle.len();
            continue;
        }

        let char_len = haystack[pos..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(1);
        out.push_str(&haystack[pos..pos + char_len]);
        pos += char_len;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dollar_price_with_separators() {
        let parsed = parse_price("$1,500.50");
        assert_eq!(parsed.amount, Some(1500.50));
        assert_eq!(parsed.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_parse_monthly_rent() {
        let parsed = parse_price("$2,000/month");
        assert_eq!(parsed.amount, Some(2000.0));
        assert_eq!(parsed.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_parse_euro_symbol() {
        let parsed = parse_price("€1850 per month");
        assert_eq!(parsed.amount, Some(1850.0));
        assert_eq!(parsed.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_parse_cad_by_code_only() {
        let parsed = parse_price("CAD 1,200");
        assert_eq!(parsed.amount, Some(1200.0));
        assert_eq!(parsed.currency.as_deref(), Some("CAD"));

        // A bare dollar sign is USD, never CAD
        let parsed = parse_price("$1,200");
        assert_eq!(parsed.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_parse_lowercase_code() {
        let parsed = parse_price("gbp 950");
        assert_eq!(parsed.amount, Some(950.0));
        assert_eq!(parsed.currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_symbol_wins_over_code() {
        // "$" is scanned before any code
        let parsed = parse_price("$100 USD");
        assert_eq!(parsed.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_no_digits_yields_absent_amount() {
        let parsed = parse_price("Price on request");
        assert_eq!(parsed.amount, None);
        assert_eq!(parsed.currency, None);
    }

    #[test]
    fn test_unknown_currency_yields_absent() {
        let parsed = parse_price("1500 CHF");
        assert_eq!(parsed.amount, Some(1500.0));
        assert_eq!(parsed.currency, None);
    }

    #[test]
    fn test_non_ascii_input_survives() {
        let parsed = parse_price("₺1,500 aylık");
        assert_eq!(parsed.amount, Some(1500.0));
        assert_eq!(parsed.currency, None);
    }

    #[test]
    fn test_convert_to_usd_identity() {
        assert_eq!(convert_to_usd(1500.50, "USD"), Some(1500.50));
    }

    #[test]
    fn test_convert_to_usd_rates() {
        assert_eq!(convert_to_usd(1000.0, "EUR"), Some(1080.0));
        assert_eq!(convert_to_usd(1000.0, "CAD"), Some(730.0));
        assert_eq!(convert_to_usd(1000.0, "GBP"), Some(1260.0));
    }

    #[test]
    fn test_convert_unknown_currency() {
        assert_eq!(convert_to_usd(1000.0, "JPY"), None);
    }

    #[test]
    fn test_convert_rounds_to_cents() {
        assert_eq!(convert_to_usd(1850.0, "EUR"), Some(1998.0));
        assert_eq!(convert_to_usd(999.99, "EUR"), Some(1079.99));
    }
}
