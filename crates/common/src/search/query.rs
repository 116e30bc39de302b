//! Search query construction
//!
//! Translates a validated property search into the search-store query DSL.
//! Everything here is pure data assembly; the gateway validates raw
//! parameters before they reach this module.

use serde_json::{json, Value};

/// Geo-disc filter; the gateway guarantees all three values arrive together
/// and that the radius is positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFilter {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
}

/// Sort dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Price,
    Date,
    Area,
    Relevance,
    Distance,
}

impl SortBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "price" => Some(SortBy::Price),
            "date" => Some(SortBy::Date),
            "area" => Some(SortBy::Area),
            "relevance" => Some(SortBy::Relevance),
            "distance" => Some(SortBy::Distance),
            _ => None,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// A validated property search
#[derive(Debug, Clone, Default)]
pub struct PropertySearch {
    /// Free-text query across the descriptive fields
    pub q: Option<String>,

    pub geo: Option<GeoFilter>,

    pub min_price: Option<f64>,
    pub max_price: Option<f64>,

    /// OR-combined exact matches on the normalized type
    pub property_types: Vec<String>,

    pub min_beds: Option<i32>,
    pub max_beds: Option<i32>,

    pub min_baths: Option<f64>,
    pub max_baths: Option<f64>,

    pub min_area_sqft: Option<f64>,
    pub max_area_sqft: Option<f64>,

    /// AND-combined amenity requirements, lower-cased
    pub amenities: Vec<String>,

    pub sort_by: Option<SortBy>,
    pub order: Option<SortOrder>,

    pub page: u64,
    pub limit: u64,
}

impl PropertySearch {
    /// Resolve the effective sort dimension and direction.
    ///
    /// Default sort: free text present → relevance; geo filter active →
    /// distance; otherwise date. Direction defaults to desc, except distance
    /// which is nearest-first unless overridden.
    pub fn resolved_sort(&self) -> (SortBy, SortOrder) {
        let sort_by = self.sort_by.unwrap_or_else(|| {
            if self.q.is_some() {
                SortBy::Relevance
            } else if self.geo.is_some() {
                SortBy::Distance
            } else {
                SortBy::Date
            }
        });

        let order = self.order.unwrap_or(match sort_by {
            SortBy::Distance => SortOrder::Asc,
            _ => SortOrder::Desc,
        });

        (sort_by, order)
    }

    /// Pagination offset
    pub fn from_offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    /// Build the full search request body
    pub fn build_search_body(&self) -> Value {
        let mut filter = vec![json!({ "term": { "status": "active" } })];

        if let Some(range) = range_clause("normalized_price_usd", self.min_price, self.max_price) {
            filter.push(range);
        }
        if let Some(range) = range_clause(
            "bedrooms",
            self.min_beds.map(f64::from),
            self.max_beds.map(f64::from),
        ) {
            filter.push(range);
        }
        if let Some(range) = range_clause("bathrooms", self.min_baths, self.max_baths) {
            filter.push(range);
        }
        if let Some(range) =
            range_clause("normalized_area_sqft", self.min_area_sqft, self.max_area_sqft)
        {
            filter.push(range);
        }

        if !self.property_types.is_empty() {
            let types: Vec<String> = self
                .property_types
                .iter()
                .map(|t| t.trim().to_lowercase())
                .collect();
            filter.push(json!({ "terms": { "property_type.keyword": types } }));
        }

        // Every amenity must be present
        for amenity in &self.amenities {
            filter.push(json!({ "term": { "amenities": amenity.trim().to_lowercase() } }));
        }

        if let Some(geo) = self.geo {
            filter.push(json!({
                "geo_distance": {
                    "distance": format!("{}km", geo.radius_km),
                    "location_coordinates": { "lat": geo.lat, "lon": geo.lon }
                }
            }));
        }

        let mut bool_query = json!({ "filter": filter });

        if let Some(ref q) = self.q {
            bool_query["must"] = json!([{
                "multi_match": {
                    "query": q,
                    "fields": [
                        "title^3",
                        "location_text^2",
                        "address_raw^2",
                        "description",
                        "source_name",
                        "property_type",
                        "amenities"
                    ],
                    "fuzziness": "AUTO",
                    "operator": "or"
                }
            }]);
        }

        json!({
            "query": { "bool": bool_query },
            "sort": self.build_sort(),
            "from": self.from_offset(),
            "size": self.limit,
            "track_total_hits": true
        })
    }

    /// Build the sort array: the resolved primary sort followed by the
    /// tie-breaks (date desc, then score desc), skipping duplicates of the
    /// primary.
    fn build_sort(&self) -> Value {
        let (sort_by, order) = self.resolved_sort();

        let primary = match sort_by {
            SortBy::Price => json!({ "normalized_price_usd": { "order": order.as_str() } }),
            SortBy::Date => json!({ "date_posted": { "order": order.as_str() } }),
            SortBy::Area => json!({ "normalized_area_sqft": { "order": order.as_str() } }),
            SortBy::Relevance => json!({ "_score": { "order": order.as_str() } }),
            SortBy::Distance => {
                // Validation guarantees the geo triple when distance sorting
                // was requested explicitly; fall back to date if it is absent
                match self.geo {
                    Some(geo) => json!({
                        "_geo_distance": {
                            "location_coordinates": { "lat": geo.lat, "lon": geo.lon },
                            "order": order.as_str(),
                            "unit": "km"
                        }
                    }),
                    None => json!({ "date_posted": { "order": order.as_str() } }),
                }
            }
        };

        let mut sort = vec![primary];

        if sort_by != SortBy::Date {
            sort.push(json!({ "date_posted": { "order": "desc" } }));
        }
        if sort_by != SortBy::Relevance {
            sort.push(json!({ "_score": { "order": "desc" } }));
        }

        Value::Array(sort)
    }
}

fn range_clause(field: &str, min: Option<f64>, max: Option<f64>) -> Option<Value> {
    let mut bounds = serde_json::Map::new();
    if let Some(min) = min {
        bounds.insert("gte".to_string(), json!(min));
    }
    if let Some(max) = max {
        bounds.insert("lte".to_string(), json!(max));
    }

    if bounds.is_empty() {
        None
    } else {
        Some(json!({ "range": { field: bounds } }))
    }
}

/// Number of term buckets returned per facet
pub const FACET_BUCKET_COUNT: u64 = 50;

/// Build the facet-metadata aggregation body over active listings
pub fn build_metadata_body() -> Value {
    json!({
        "size": 0,
        "query": { "term": { "status": "active" } },
        "aggs": {
            "price_stats": { "stats": { "field": "normalized_price_usd" } },
            "bedroom_stats": { "stats": { "field": "bedrooms" } },
            "bathroom_stats": { "stats": { "field": "bathrooms" } },
            "area_stats": { "stats": { "field": "normalized_area_sqft" } },
            "property_types": {
                "terms": { "field": "property_type.keyword", "size": FACET_BUCKET_COUNT }
            },
            "amenities": {
                "terms": { "field": "amenities", "size": FACET_BUCKET_COUNT }
            },
            "locations": {
                "terms": { "field": "address_raw.keyword", "size": FACET_BUCKET_COUNT }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_search() -> PropertySearch {
        PropertySearch {
            page: 1,
            limit: 10,
            ..Default::default()
        }
    }

    fn filters(body: &Value) -> &Vec<Value> {
        body["query"]["bool"]["filter"].as_array().unwrap()
    }

    #[test]
    fn test_active_filter_always_applied() {
        let body = base_search().build_search_body();
        assert_eq!(filters(&body)[0], json!({ "term": { "status": "active" } }));
    }

    #[test]
    fn test_price_range() {
        let mut search = base_search();
        search.min_price = Some(1500.0);
        search.max_price = Some(2500.0);

        let body = search.build_search_body();
        let range = filters(&body)
            .iter()
            .find(|f| f["range"]["normalized_price_usd"].is_object())
            .unwrap();

        assert_eq!(range["range"]["normalized_price_usd"]["gte"], json!(1500.0));
        assert_eq!(range["range"]["normalized_price_usd"]["lte"], json!(2500.0));
    }

    #[test]
    fn test_open_ended_range() {
        let mut search = base_search();
        search.min_beds = Some(2);

        let body = search.build_search_body();
        let range = filters(&body)
            .iter()
            .find(|f| f["range"]["bedrooms"].is_object())
            .unwrap();

        assert_eq!(range["range"]["bedrooms"]["gte"], json!(2.0));
        assert!(range["range"]["bedrooms"].get("lte").is_none());
    }

    #[test]
    fn test_amenities_are_and_combined() {
        let mut search = base_search();
        search.amenities = vec!["Parking".to_string(), "Gym".to_string()];

        let body = search.build_search_body();
        let amenity_terms: Vec<_> = filters(&body)
            .iter()
            .filter(|f| f["term"]["amenities"].is_string())
            .collect();

        assert_eq!(amenity_terms.len(), 2);
        assert_eq!(amenity_terms[0]["term"]["amenities"], json!("parking"));
        assert_eq!(amenity_terms[1]["term"]["amenities"], json!("gym"));
    }

    #[test]
    fn test_empty_amenities_do_not_filter() {
        let body = base_search().build_search_body();
        assert!(filters(&body)
            .iter()
            .all(|f| !f["term"]["amenities"].is_string()));
    }

    #[test]
    fn test_property_types_or_combined() {
        let mut search = base_search();
        search.property_types = vec!["Apartment".to_string(), "condo".to_string()];

        let body = search.build_search_body();
        let terms = filters(&body)
            .iter()
            .find(|f| f["terms"]["property_type.keyword"].is_array())
            .unwrap();

        assert_eq!(
            terms["terms"]["property_type.keyword"],
            json!(["apartment", "condo"])
        );
    }

    #[test]
    fn test_geo_filter_clause() {
        let mut search = base_search();
        search.geo = Some(GeoFilter {
            lat: 47.6,
            lon: -122.3,
            radius_km: 5.0,
        });

        let body = search.build_search_body();
        let geo = filters(&body)
            .iter()
            .find(|f| f["geo_distance"].is_object())
            .unwrap();

        assert_eq!(geo["geo_distance"]["distance"], json!("5km"));
        assert_eq!(
            geo["geo_distance"]["location_coordinates"],
            json!({ "lat": 47.6, "lon": -122.3 })
        );
    }

    #[test]
    fn test_free_text_multi_match() {
        let mut search = base_search();
        search.q = Some("sunny apartment".to_string());

        let body = search.build_search_body();
        let multi_match = &body["query"]["bool"]["must"][0]["multi_match"];

        assert_eq!(multi_match["query"], json!("sunny apartment"));
        assert_eq!(multi_match["fields"][0], json!("title^3"));
        assert_eq!(multi_match["fuzziness"], json!("AUTO"));
        assert_eq!(multi_match["operator"], json!("or"));
    }

    #[test]
    fn test_default_sort_is_date_desc() {
        let search = base_search();
        assert_eq!(search.resolved_sort(), (SortBy::Date, SortOrder::Desc));

        let body = search.build_search_body();
        assert_eq!(body["sort"][0], json!({ "date_posted": { "order": "desc" } }));
        // Tie-break on score only; date is already the primary
        assert_eq!(body["sort"][1], json!({ "_score": { "order": "desc" } }));
        assert!(body["sort"][2].is_null());
    }

    #[test]
    fn test_free_text_defaults_to_relevance() {
        let mut search = base_search();
        search.q = Some("loft".to_string());
        assert_eq!(search.resolved_sort(), (SortBy::Relevance, SortOrder::Desc));
    }

    #[test]
    fn test_geo_defaults_to_distance_asc() {
        let mut search = base_search();
        search.geo = Some(GeoFilter {
            lat: 47.6,
            lon: -122.3,
            radius_km: 5.0,
        });

        assert_eq!(search.resolved_sort(), (SortBy::Distance, SortOrder::Asc));

        let body = search.build_search_body();
        assert_eq!(body["sort"][0]["_geo_distance"]["order"], json!("asc"));
    }

    #[test]
    fn test_explicit_sort_overrides_defaults() {
        let mut search = base_search();
        search.q = Some("loft".to_string());
        search.sort_by = Some(SortBy::Price);
        search.order = Some(SortOrder::Asc);

        let body = search.build_search_body();
        assert_eq!(
            body["sort"][0],
            json!({ "normalized_price_usd": { "order": "asc" } })
        );
        // Tie-breaks follow: date desc, then score desc
        assert_eq!(body["sort"][1], json!({ "date_posted": { "order": "desc" } }));
        assert_eq!(body["sort"][2], json!({ "_score": { "order": "desc" } }));
    }

    #[test]
    fn test_pagination_offsets() {
        let mut search = base_search();
        search.page = 3;
        search.limit = 20;

        let body = search.build_search_body();
        assert_eq!(body["from"], json!(40));
        assert_eq!(body["size"], json!(20));
    }

    #[test]
    fn test_metadata_body_scopes_to_active() {
        let body = build_metadata_body();
        assert_eq!(body["size"], json!(0));
        assert_eq!(body["query"], json!({ "term": { "status": "active" } }));
        assert!(body["aggs"]["price_stats"].is_object());
        assert!(body["aggs"]["property_types"].is_object());
        assert!(body["aggs"]["locations"].is_object());
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(SortBy::parse("price"), Some(SortBy::Price));
        assert_eq!(SortBy::parse("distance"), Some(SortBy::Distance));
        assert_eq!(SortBy::parse("random"), None);
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("up"), None);
    }
}
