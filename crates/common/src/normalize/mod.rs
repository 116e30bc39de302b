//! Normalization engine for raw listing messages
//!
//! Pure, deterministic transformations from the queue message shape to the
//! master-record shape. Parsing is best-effort throughout: unrecognizable
//! text degrades to absent fields, never to a rejected message.

mod area;
mod price;
mod rooms;

pub use area::{convert_to_sqft, parse_area, AreaUnit, ParsedArea};
pub use price::{convert_to_usd, detect_currency, parse_price, ParsedPrice};
pub use rooms::{parse_bathrooms, parse_bedrooms};

use crate::db::models::ListingStatus;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Source name recorded when a producer did not identify itself
pub const UNKNOWN_SOURCE: &str = "unknown";

/// A value that producers send either as a string or as a bare number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextOrNumber {
    Text(String),
    Number(f64),
}

impl TextOrNumber {
    pub fn into_text(self) -> String {
        match self {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Number(n) => n.to_string(),
        }
    }
}

/// A value that producers send either as a scalar string or as an array
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrList {
    Scalar(String),
    List(Vec<Value>),
}

/// Raw listing message as published by the scraping workers.
///
/// Every field is optional; aliases cover the older producer field names
/// (`address` for the location, `url`/`source` from the first-generation
/// scrapers).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListing {
    pub title: Option<String>,

    pub price: Option<TextOrNumber>,
    pub price_text: Option<String>,

    #[serde(alias = "address")]
    pub location: Option<String>,
    pub location_text: Option<String>,

    pub bedrooms_text: Option<String>,
    pub bathrooms_text: Option<String>,

    pub area: Option<TextOrNumber>,
    pub area_text: Option<String>,

    pub images: Option<ScalarOrList>,

    pub description: Option<String>,
    pub property_type: Option<String>,

    pub amenities: Option<ScalarOrList>,

    #[serde(alias = "url")]
    pub source_url: Option<String>,
    #[serde(alias = "source")]
    pub source_name: Option<String>,

    pub date_posted: Option<String>,
}

/// Normalized intermediate record, ready for enrichment and persistence.
///
/// Field names match the master-store columns; enrichment fills in the
/// geometry and dedup fields later in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListing {
    pub source_url: String,
    pub source_name: String,
    pub title: String,
    pub description: Option<String>,
    pub images: Vec<String>,

    pub price_original_numeric: Option<f64>,
    pub price_original_text: Option<String>,
    pub currency_original: Option<String>,
    pub normalized_price_usd: Option<f64>,

    pub address_raw: Option<String>,
    pub location_text: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocoded_payload: Option<Value>,

    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub area_original_value: Option<f64>,
    pub area_unit_original: Option<String>,
    pub normalized_area_sqft: Option<f64>,

    pub property_type: Option<String>,
    pub amenities: Vec<String>,

    pub date_posted: Option<DateTime<Utc>>,
    pub scrape_timestamp: DateTime<Utc>,

    pub status: ListingStatus,
    pub duplicate_of_property_id: Option<i64>,
}

/// Normalize a raw message into the master-record shape.
///
/// `now` becomes the `scrape_timestamp` and seeds the synthetic source URL
/// for messages that arrive without one.
pub fn normalize(raw: RawListing, now: DateTime<Utc>) -> NormalizedListing {
    let source_url = raw
        .source_url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| synthetic_source_url(now));

    let source_name = raw
        .source_name
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| crate::UNTITLED_LISTING.to_string());

    // Price: prefer the dedicated text field, fall back to the bare price
    let price_text = raw
        .price_text
        .or_else(|| raw.price.map(TextOrNumber::into_text))
        .filter(|t| !t.trim().is_empty());

    let parsed_price = price_text
        .as_deref()
        .map(parse_price)
        .unwrap_or_default();

    let normalized_price_usd = match (parsed_price.amount, parsed_price.currency.as_deref()) {
        (Some(amount), Some(currency)) => convert_to_usd(amount, currency),
        _ => None,
    };

    // Area
    let area_text = raw
        .area_text
        .or_else(|| raw.area.map(TextOrNumber::into_text))
        .filter(|t| !t.trim().is_empty());

    let parsed_area = area_text.as_deref().map(parse_area).unwrap_or_default();

    let normalized_area_sqft = match (parsed_area.value, parsed_area.unit) {
        (Some(value), Some(unit)) => Some(convert_to_sqft(value, unit)),
        _ => None,
    };

    let bedrooms = raw.bedrooms_text.as_deref().and_then(parse_bedrooms);
    let bathrooms = raw.bathrooms_text.as_deref().and_then(parse_bathrooms);

    let location_text = raw
        .location_text
        .clone()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    // Street address when the source gave one, otherwise the location label
    // still gives the geocoder something to work with
    let address_raw = raw
        .location
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| location_text.clone());

    let property_type = raw
        .property_type
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty());

    NormalizedListing {
        source_url,
        source_name,
        title,
        description: raw.description.filter(|d| !d.trim().is_empty()),
        images: coerce_images(raw.images),

        price_original_numeric: parsed_price.amount,
        price_original_text: price_text,
        currency_original: parsed_price.currency,
        normalized_price_usd,

        address_raw,
        location_text,
        latitude: None,
        longitude: None,
        geocoded_payload: None,

        bedrooms,
        bathrooms,
        area_original_value: parsed_area.value,
        area_unit_original: parsed_area.unit.map(|u| u.as_str().to_string()),
        normalized_area_sqft,

        property_type,
        amenities: coerce_amenities(raw.amenities),

        date_posted: raw.date_posted.as_deref().and_then(parse_date_posted),
        scrape_timestamp: now,

        status: ListingStatus::Active,
        duplicate_of_property_id: None,
    }
}

/// Parse a source-provided posting date into UTC. Accepts RFC 3339 plus the
/// date formats the feeds actually use; anything else is absent.
pub fn parse_date_posted(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%d %B %Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

/// Synthetic unique source URL for messages that arrived without one,
/// preserving the uniqueness anchor of the master store.
fn synthetic_source_url(now: DateTime<Utc>) -> String {
    format!(
        "missing_url_{}_{}",
        now.timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Coerce the raw images value to an ordered sequence of URL strings
fn coerce_images(images: Option<ScalarOrList>) -> Vec<String> {
    match images {
        None => Vec::new(),
        Some(ScalarOrList::Scalar(url)) => {
            let trimmed = url.trim().to_string();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed]
            }
        }
        Some(ScalarOrList::List(values)) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

/// Coerce the raw amenities value into a lower-cased, deduplicated set.
/// Scalar input is comma-split; empty elements are dropped.
fn coerce_amenities(amenities: Option<ScalarOrList>) -> Vec<String> {
    let items: Vec<String> = match amenities {
        None => Vec::new(),
        Some(ScalarOrList::Scalar(text)) => {
            text.split(',').map(|s| s.to_string()).collect()
        }
        Some(ScalarOrList::List(values)) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
    };

    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_from_json(json: serde_json::Value) -> RawListing {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_normalize_happy_path() {
        let raw = raw_from_json(serde_json::json!({
            "source_url": "u1",
            "title": "Sunny 2BR",
            "price_text": "$2,000/month",
            "bedrooms_text": "2 Beds",
            "bathrooms_text": "1 Bath",
            "area_text": "900 sqft",
            "location_text": "Seattle, WA",
            "source_name": "S1"
        }));

        let normalized = normalize(raw, Utc::now());

        assert_eq!(normalized.source_url, "u1");
        assert_eq!(normalized.normalized_price_usd, Some(2000.0));
        assert_eq!(normalized.bedrooms, Some(2));
        assert_eq!(normalized.bathrooms, Some(1.0));
        assert_eq!(normalized.normalized_area_sqft, Some(900.0));
        assert_eq!(normalized.status, ListingStatus::Active);
        assert_eq!(normalized.address_raw.as_deref(), Some("Seattle, WA"));
    }

    #[test]
    fn test_title_defaults() {
        let normalized = normalize(RawListing::default(), Utc::now());
        assert_eq!(normalized.title, "Untitled Listing");
    }

    #[test]
    fn test_missing_source_url_is_synthesized() {
        let now = Utc::now();
        let a = normalize(RawListing::default(), now);
        let b = normalize(RawListing::default(), now);

        assert!(a.source_url.starts_with("missing_url_"));
        // Uniqueness is preserved even within the same instant
        assert_ne!(a.source_url, b.source_url);
    }

    #[test]
    fn test_usd_presence_implies_numeric_and_currency() {
        let raw = raw_from_json(serde_json::json!({ "price_text": "around 1500" }));
        let normalized = normalize(raw, Utc::now());

        // Amount parsed but no currency detected: no USD conversion
        assert_eq!(normalized.price_original_numeric, Some(1500.0));
        assert_eq!(normalized.currency_original, None);
        assert_eq!(normalized.normalized_price_usd, None);
    }

    #[test]
    fn test_price_falls_back_to_bare_field() {
        let raw = raw_from_json(serde_json::json!({ "price": "$950/month" }));
        let normalized = normalize(raw, Utc::now());

        assert_eq!(normalized.price_original_numeric, Some(950.0));
        assert_eq!(normalized.normalized_price_usd, Some(950.0));
    }

    #[test]
    fn test_numeric_price_field() {
        let raw = raw_from_json(serde_json::json!({ "price": 1200.0 }));
        let normalized = normalize(raw, Utc::now());

        assert_eq!(normalized.price_original_numeric, Some(1200.0));
        // No currency marker on a bare number
        assert_eq!(normalized.normalized_price_usd, None);
    }

    #[test]
    fn test_amenities_scalar_comma_split() {
        let raw = raw_from_json(serde_json::json!({
            "amenities": "Parking, Gym,, Pool ,  "
        }));
        let normalized = normalize(raw, Utc::now());

        assert_eq!(normalized.amenities, vec!["parking", "gym", "pool"]);
    }

    #[test]
    fn test_amenities_array_deduplicated() {
        let raw = raw_from_json(serde_json::json!({
            "amenities": ["Parking", "parking", "Gym"]
        }));
        let normalized = normalize(raw, Utc::now());

        assert_eq!(normalized.amenities, vec!["parking", "gym"]);
    }

    #[test]
    fn test_images_scalar_and_array() {
        let scalar = raw_from_json(serde_json::json!({ "images": "https://img/1.jpg" }));
        assert_eq!(
            normalize(scalar, Utc::now()).images,
            vec!["https://img/1.jpg"]
        );

        let list = raw_from_json(serde_json::json!({
            "images": ["https://img/1.jpg", "https://img/2.jpg", null]
        }));
        assert_eq!(
            normalize(list, Utc::now()).images,
            vec!["https://img/1.jpg", "https://img/2.jpg"]
        );
    }

    #[test]
    fn test_property_type_normalized_lowercase() {
        let raw = raw_from_json(serde_json::json!({ "property_type": "  Apartment " }));
        assert_eq!(
            normalize(raw, Utc::now()).property_type.as_deref(),
            Some("apartment")
        );

        let empty = raw_from_json(serde_json::json!({ "property_type": "   " }));
        assert_eq!(normalize(empty, Utc::now()).property_type, None);
    }

    #[test]
    fn test_producer_aliases() {
        // First-generation scrapers publish url/source/address
        let raw = raw_from_json(serde_json::json!({
            "url": "https://listings.example/42",
            "source": "mock_craigslist",
            "address": "123 Main St"
        }));
        let normalized = normalize(raw, Utc::now());

        assert_eq!(normalized.source_url, "https://listings.example/42");
        assert_eq!(normalized.source_name, "mock_craigslist");
        assert_eq!(normalized.address_raw.as_deref(), Some("123 Main St"));
    }

    #[test]
    fn test_date_posted_formats() {
        assert!(parse_date_posted("2025-06-01").is_some());
        assert!(parse_date_posted("2025-06-01T10:30:00Z").is_some());
        assert!(parse_date_posted("06/01/2025").is_some());
        assert!(parse_date_posted("June 1, 2025").is_some());
        assert!(parse_date_posted("yesterday").is_none());
        assert!(parse_date_posted("").is_none());
    }

    #[test]
    fn test_unparseable_date_is_absent() {
        let raw = raw_from_json(serde_json::json!({ "date_posted": "a while ago" }));
        assert_eq!(normalize(raw, Utc::now()).date_posted, None);
    }
}
