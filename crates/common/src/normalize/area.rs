//! Area text parsing and unit conversion to square feet

use regex::Regex;
use std::sync::LazyLock;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9.]+").expect("static regex"));

/// Unit of a scraped area figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaUnit {
    Sqft,
    SquareMeters,
    Acres,
}

impl AreaUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaUnit::Sqft => "sqft",
            AreaUnit::SquareMeters => "m²",
            AreaUnit::Acres => "acres",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sqft" => Some(AreaUnit::Sqft),
            "m²" | "sqm" | "m2" => Some(AreaUnit::SquareMeters),
            "acres" | "acre" => Some(AreaUnit::Acres),
            _ => None,
        }
    }

    /// Conversion factor to square feet
    pub fn sqft_factor(&self) -> f64 {
        match self {
            AreaUnit::Sqft => 1.0,
            AreaUnit::SquareMeters => 10.7639,
            AreaUnit::Acres => 43560.0,
        }
    }
}

/// Unit tokens recognized in scraped text, longest first so that stripping
/// "sq.ft" does not leave a dangling "sq." behind.
const UNIT_TOKENS: &[(&str, AreaUnit)] = &[
    ("sq.ft", AreaUnit::Sqft),
    ("sqft", AreaUnit::Sqft),
    ("ft2", AreaUnit::Sqft),
    ("sqm", AreaUnit::SquareMeters),
    ("m²", AreaUnit::SquareMeters),
    ("m2", AreaUnit::SquareMeters),
    ("acres", AreaUnit::Acres),
    ("acre", AreaUnit::Acres),
];

/// Outcome of parsing a free-form area string
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedArea {
    pub value: Option<f64>,
    pub unit: Option<AreaUnit>,
}

/// Parse a free-form area string ("900 sqft", "85 m²", "0.5 acres")
pub fn parse_area(text: &str) -> ParsedArea {
    let lowered = text.to_lowercase();

    let unit = UNIT_TOKENS
        .iter()
        .find(|(token, _)| lowered.contains(token))
        .map(|(_, unit)| *unit);

    let mut cleaned = lowered;
    for (token, _) in UNIT_TOKENS {
        cleaned = cleaned.replace(token, "");
    }
    cleaned = cleaned.replace(',', "");

    let value = NUMBER_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok());

    ParsedArea { value, unit }
}

/// Convert an area value to square feet
pub fn convert_to_sqft(value: f64, unit: AreaUnit) -> f64 {
    value * unit.sqft_factor()
}
