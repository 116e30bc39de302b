//! Filter metadata handler
//!
//! `GET /properties/filters/metadata`: aggregate bounds and term counts
//! over active listings, used to populate UI filter controls.

use axum::{
    extract::{Query, State},
    Json,
};
use homescout_common::{
    cache::keys,
    errors::Result,
    metrics,
    search::query::build_metadata_body,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

use crate::AppState;

/// Numeric bounds for a range filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFacet {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// One term bucket with its listing count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermBucket {
    pub value: String,
    pub count: u64,
}

/// The full facet bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersMetadataResponse {
    pub price: RangeFacet,
    pub bedrooms: RangeFacet,
    pub bathrooms: RangeFacet,
    pub area_sqft: RangeFacet,
    pub property_types: Vec<TermBucket>,
    pub amenities: Vec<TermBucket>,
    pub locations: Vec<TermBucket>,
}

/// Facet metadata over active listings
pub async fn filters_metadata(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<FiltersMetadataResponse>> {
    let cache_key = keys::query_key(
        keys::METADATA_PREFIX,
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    );
    let ttl = state.config.cache.metadata_ttl_secs;

    let response = match state.cache {
        Some(ref cache) => {
            cache
                .get_or_load(&cache_key, ttl, || execute_metadata(&state))
                .await?
        }
        None => execute_metadata(&state).await?,
    };

    Ok(Json(response))
}

async fn execute_metadata(state: &AppState) -> Result<FiltersMetadataResponse> {
    let started = Instant::now();
    let aggregations = state.search.aggregate(&build_metadata_body()).await?;
    metrics::record_search(started.elapsed().as_secs_f64(), "metadata");

    tracing::info!(
        latency_ms = started.elapsed().as_millis() as u64,
        "Filter metadata computed"
    );

    Ok(parse_aggregations(&aggregations))
}

/// Decode the aggregation response into the facet bundle. Missing or
/// malformed pieces become empty facets rather than errors: an empty corpus
/// must still produce a usable response.
fn parse_aggregations(aggregations: &Value) -> FiltersMetadataResponse {
    FiltersMetadataResponse {
        price: stats_facet(&aggregations["price_stats"]),
        bedrooms: stats_facet(&aggregations["bedroom_stats"]),
        bathrooms: stats_facet(&aggregations["bathroom_stats"]),
        area_sqft: stats_facet(&aggregations["area_stats"]),
        property_types: term_buckets(&aggregations["property_types"]),
        amenities: term_buckets(&aggregations["amenities"]),
        locations: term_buckets(&aggregations["locations"]),
    }
}

fn stats_facet(stats: &Value) -> RangeFacet {
    RangeFacet {
        min: stats["min"].as_f64(),
        max: stats["max"].as_f64(),
    }
}

fn term_buckets(terms: &Value) -> Vec<TermBucket> {
    terms["buckets"]
        .as_array()
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|bucket| {
                    Some(TermBucket {
                        value: bucket["key"].as_str()?.to_string(),
                        count: bucket["doc_count"].as_u64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_aggregations() {
        let aggregations = json!({
            "price_stats": { "count": 3, "min": 1200.0, "max": 3500.0, "avg": 2233.3 },
            "bedroom_stats": { "count": 3, "min": 0.0, "max": 4.0 },
            "bathroom_stats": { "count": 3, "min": 1.0, "max": 2.5 },
            "area_stats": { "count": 2, "min": 450.0, "max": 1800.0 },
            "property_types": {
                "buckets": [
                    { "key": "apartment", "doc_count": 2 },
                    { "key": "house", "doc_count": 1 }
                ]
            },
            "amenities": {
                "buckets": [{ "key": "parking", "doc_count": 3 }]
            },
            "locations": {
                "buckets": [{ "key": "Seattle, WA", "doc_count": 3 }]
            }
        });

        let metadata = parse_aggregations(&aggregations);

        assert_eq!(
            metadata.price,
            RangeFacet {
                min: Some(1200.0),
                max: Some(3500.0)
            }
        );
        assert_eq!(metadata.bedrooms.min, Some(0.0));
        assert_eq!(metadata.property_types.len(), 2);
        assert_eq!(metadata.property_types[0].value, "apartment");
        assert_eq!(metadata.property_types[0].count, 2);
        assert_eq!(metadata.locations[0].value, "Seattle, WA");
    }

    #[test]
    fn test_parse_empty_corpus() {
        // stats aggregations return null bounds when nothing matches
        let aggregations = json!({
            "price_stats": { "count": 0, "min": null, "max": null },
            "bedroom_stats": { "count": 0, "min": null, "max": null },
            "bathroom_stats": { "count": 0, "min": null, "max": null },
            "area_stats": { "count": 0, "min": null, "max": null },
            "property_types": { "buckets": [] },
            "amenities": { "buckets": [] },
            "locations": { "buckets": [] }
        });

        let metadata = parse_aggregations(&aggregations);

        assert_eq!(metadata.price, RangeFacet { min: None, max: None });
        assert!(metadata.property_types.is_empty());
        assert!(metadata.amenities.is_empty());
    }

    #[test]
    fn test_parse_missing_aggregations() {
        let metadata = parse_aggregations(&Value::Null);

        assert_eq!(metadata.price, RangeFacet { min: None, max: None });
        assert!(metadata.locations.is_empty());
    }
}
