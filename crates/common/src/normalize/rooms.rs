//! Bedroom and bathroom count extraction

use regex::Regex;
use std::sync::LazyLock;

static BEDROOMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(bed|br|bedroom)").expect("static regex"));

static BARE_INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*$").expect("static regex"));

static BATHROOMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9.]+)\s*(bath|ba|bathroom)").expect("static regex"));

static BARE_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9.]+)\s*$").expect("static regex"));

/// Parse a bedroom count from scraped text. "Studio" maps to 0.
pub fn parse_bedrooms(text: &str) -> Option<i32> {
    let lowered = text.to_lowercase();

    if lowered.contains("studio") {
        return Some(0);
    }

    if let Some(caps) = BEDROOMS_RE.captures(&lowered) {
        return caps[1].parse().ok();
    }

    BARE_INT_RE
        .captures(&lowered)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse a bathroom count from scraped text. Half-steps are preserved.
pub fn parse_bathrooms(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase();

    if let Some(caps) = BATHROOMS_RE.captures(&lowered) {
        return caps[1].parse().ok();
    }

    BARE_DECIMAL_RE
        .captures(&lowered)
        .and_then(|caps| caps[1].parse().ok())
}
