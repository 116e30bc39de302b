//! Property search handler
//!
//! `GET /properties`: paginated, filtered, sorted search over active
//! listings. Raw query parameters are validated here; the query DSL itself
//! is assembled in `homescout_common::search::query`.

use axum::{
    extract::{Query, State},
    Json,
};
use homescout_common::{
    cache::keys,
    errors::{AppError, Result},
    metrics,
    search::{GeoFilter, PropertySearch, SearchDocument, SearchHits, SortBy, SortOrder},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::AppState;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 10;

/// Paginated search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertiesResponse {
    pub items: Vec<SearchDocument>,
    pub page: u64,
    pub limit: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub next_page: Option<u64>,
    pub prev_page: Option<u64>,
}

/// Search active listings
pub async fn search_properties(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PropertiesResponse>> {
    let search = parse_params(&params)?;

    let cache_key = keys::query_key(
        keys::PROPERTIES_PREFIX,
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    );
    let ttl = state.config.cache.properties_ttl_secs;

    let response = match state.cache {
        Some(ref cache) => {
            cache
                .get_or_load(&cache_key, ttl, || execute_search(&state, &search))
                .await?
        }
        None => execute_search(&state, &search).await?,
    };

    Ok(Json(response))
}

async fn execute_search(state: &AppState, search: &PropertySearch) -> Result<PropertiesResponse> {
    let started = Instant::now();
    let hits = state.search.search(&search.build_search_body()).await?;
    metrics::record_search(started.elapsed().as_secs_f64(), "properties");

    tracing::info!(
        total = hits.total,
        page = search.page,
        limit = search.limit,
        latency_ms = started.elapsed().as_millis() as u64,
        "Property search completed"
    );

    Ok(paginate(hits, search.page, search.limit))
}

/// Shape a page of hits into the pagination envelope
fn paginate(hits: SearchHits, page: u64, limit: u64) -> PropertiesResponse {
    let total_items = hits.total;
    let total_pages = if total_items == 0 {
        0
    } else {
        (total_items + limit - 1) / limit
    };

    PropertiesResponse {
        items: hits.documents,
        page,
        limit,
        total_items,
        total_pages,
        next_page: (page < total_pages).then(|| page + 1),
        prev_page: (page > 1).then(|| page - 1),
    }
}

/// Validate raw query parameters into a `PropertySearch`
fn parse_params(params: &HashMap<String, String>) -> Result<PropertySearch> {
    let page = parse_positive_int(params, "page")?.unwrap_or(DEFAULT_PAGE);
    let limit = parse_positive_int(params, "limit")?.unwrap_or(DEFAULT_LIMIT);

    let geo = parse_geo(params)?;

    let sort_by = match params.get("sort_by") {
        Some(raw) => Some(SortBy::parse(raw).ok_or_else(|| AppError::Validation {
            message: format!(
                "sort_by must be one of price, date, area, relevance, distance; got '{}'",
                raw
            ),
            field: Some("sort_by".to_string()),
        })?),
        None => None,
    };

    let order = match params.get("order") {
        Some(raw) => Some(SortOrder::parse(raw).ok_or_else(|| AppError::Validation {
            message: format!("order must be asc or desc; got '{}'", raw),
            field: Some("order".to_string()),
        })?),
        None => None,
    };

    Ok(PropertySearch {
        q: params
            .get("q")
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty()),
        geo,
        min_price: parse_float(params, "min_price")?,
        max_price: parse_float(params, "max_price")?,
        property_types: comma_list(params.get("property_type")),
        min_beds: parse_int(params, "min_beds")?,
        max_beds: parse_int(params, "max_beds")?,
        min_baths: parse_float(params, "min_baths")?,
        max_baths: parse_float(params, "max_baths")?,
        min_area_sqft: parse_float(params, "min_area_sqft")?,
        max_area_sqft: parse_float(params, "max_area_sqft")?,
        amenities: comma_list(params.get("amenities")),
        sort_by,
        order,
        page,
        limit,
    })
}

/// The geo filter requires the full triple, with a positive radius
fn parse_geo(params: &HashMap<String, String>) -> Result<Option<GeoFilter>> {
    let lat = params.get("lat");
    let lon = params.get("lon");
    let radius = params.get("radius_km");

    if lat.is_none() && lon.is_none() && radius.is_none() {
        return Ok(None);
    }

    let (Some(_), Some(_), Some(_)) = (lat, lon, radius) else {
        return Err(AppError::InvalidGeoFilter {
            message: "lat, lon, and radius_km are required together".to_string(),
        });
    };

    let lat = parse_float(params, "lat")?.ok_or_else(|| geo_error("lat"))?;
    let lon = parse_float(params, "lon")?.ok_or_else(|| geo_error("lon"))?;
    let radius_km = parse_float(params, "radius_km")?.ok_or_else(|| geo_error("radius_km"))?;

    if radius_km <= 0.0 {
        return Err(AppError::InvalidGeoFilter {
            message: "radius_km must be greater than zero".to_string(),
        });
    }

    Ok(Some(GeoFilter {
        lat,
        lon,
        radius_km,
    }))
}

fn geo_error(field: &str) -> AppError {
    AppError::InvalidGeoFilter {
        message: format!("{} must be a number", field),
    }
}

fn parse_positive_int(params: &HashMap<String, String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };

    match raw.parse::<u64>() {
        Ok(value) if value >= 1 => Ok(Some(value)),
        _ => Err(AppError::InvalidPagination {
            message: format!("{} must be a positive integer; got '{}'", key, raw),
        }),
    }
}

fn parse_float(params: &HashMap<String, String>, key: &str) -> Result<Option<f64>> {
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };

    raw.parse::<f64>().map(Some).map_err(|_| AppError::Validation {
        message: format!("{} must be a number; got '{}'", key, raw),
        field: Some(key.to_string()),
    })
}

fn parse_int(params: &HashMap<String, String>, key: &str) -> Result<Option<i32>> {
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };

    raw.parse::<i32>().map(Some).map_err(|_| AppError::Validation {
        message: format!("{} must be an integer; got '{}'", key, raw),
        field: Some(key.to_string()),
    })
}

/// Split a comma list, trimming entries and dropping empties
fn comma_list(raw: Option<&String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let search = parse_params(&params(&[])).unwrap();
        assert_eq!(search.page, 1);
        assert_eq!(search.limit, 10);
        assert!(search.q.is_none());
        assert!(search.geo.is_none());
    }

    #[test]
    fn test_non_positive_page_rejected() {
        let err = parse_params(&params(&[("page", "0")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidPagination { .. }));

        let err = parse_params(&params(&[("limit", "-5")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidPagination { .. }));

        let err = parse_params(&params(&[("page", "abc")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidPagination { .. }));
    }

    #[test]
    fn test_geo_triple_required_together() {
        let err = parse_params(&params(&[("lat", "47.6")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidGeoFilter { .. }));

        let err =
            parse_params(&params(&[("lat", "47.6"), ("lon", "-122.3")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidGeoFilter { .. }));

        let search = parse_params(&params(&[
            ("lat", "47.6"),
            ("lon", "-122.3"),
            ("radius_km", "5"),
        ]))
        .unwrap();
        assert_eq!(
            search.geo,
            Some(GeoFilter {
                lat: 47.6,
                lon: -122.3,
                radius_km: 5.0
            })
        );
    }

    #[test]
    fn test_non_positive_radius_rejected() {
        let err = parse_params(&params(&[
            ("lat", "47.6"),
            ("lon", "-122.3"),
            ("radius_km", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidGeoFilter { .. }));
    }

    #[test]
    fn test_comma_lists() {
        let search = parse_params(&params(&[
            ("property_type", "apartment, condo ,,house"),
            ("amenities", "parking,gym"),
        ]))
        .unwrap();

        assert_eq!(search.property_types, vec!["apartment", "condo", "house"]);
        assert_eq!(search.amenities, vec!["parking", "gym"]);
    }

    #[test]
    fn test_empty_amenities_param() {
        let search = parse_params(&params(&[("amenities", "")])).unwrap();
        assert!(search.amenities.is_empty());
    }

    #[test]
    fn test_invalid_sort_rejected() {
        let err = parse_params(&params(&[("sort_by", "random")])).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = parse_params(&params(&[("order", "sideways")])).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = parse_params(&params(&[("min_price", "lots")])).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_paginate_math() {
        let hits = SearchHits {
            total: 25,
            documents: Vec::new(),
        };

        let page = paginate(hits, 2, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.prev_page, Some(1));
    }

    #[test]
    fn test_paginate_boundaries() {
        let first = paginate(
            SearchHits {
                total: 10,
                documents: Vec::new(),
            },
            1,
            10,
        );
        assert_eq!(first.total_pages, 1);
        assert_eq!(first.next_page, None);
        assert_eq!(first.prev_page, None);

        let empty = paginate(
            SearchHits {
                total: 0,
                documents: Vec::new(),
            },
            1,
            10,
        );
        assert_eq!(empty.total_pages, 0);
        assert_eq!(empty.next_page, None);
        assert_eq!(empty.prev_page, None);
    }
}
