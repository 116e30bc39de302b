//! Search-store client for the listing index
//!
//! Speaks the Elasticsearch-compatible REST API over plain HTTP. Documents
//! are keyed by `source_url`, which makes every index write idempotent: the
//! master upsert and the index write converge independently under
//! re-delivery.

pub mod query;

pub use query::{GeoFilter, PropertySearch, SortBy, SortOrder};

use crate::config::SearchConfig;
use crate::db::models::Listing;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Geo-point pair derived from the master record's latitude/longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// The indexed projection of a master record.
///
/// Field names match the index mapping; within steady state the projection
/// of the master row to these fields is bit-identical to the stored
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
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
    pub location_coordinates: Option<GeoPoint>,

    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub area_original_value: Option<f64>,
    pub area_unit_original: Option<String>,
    pub normalized_area_sqft: Option<f64>,

    pub property_type: Option<String>,
    pub amenities: Vec<String>,

    pub date_posted: Option<DateTime<Utc>>,
    pub scrape_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub status: String,
    pub duplicate_of_property_id: Option<i64>,
}

impl SearchDocument {
    /// Project a stored master row into the index document shape
    pub fn project(row: &Listing) -> Self {
        let location_coordinates = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
            _ => None,
        };

        Self {
            source_url: row.source_url.clone(),
            source_name: row.source_name.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            images: string_array(&row.images),
            price_original_numeric: row.price_original_numeric,
            price_original_text: row.price_original_text.clone(),
            currency_original: row.currency_original.clone(),
            normalized_price_usd: row.normalized_price_usd,
            address_raw: row.address_raw.clone(),
            location_text: row.location_text.clone(),
            location_coordinates,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            area_original_value: row.area_original_value,
            area_unit_original: row.area_unit_original.clone(),
            normalized_area_sqft: row.normalized_area_sqft,
            property_type: row.property_type.clone(),
            amenities: string_array(&row.amenities),
            date_posted: row.date_posted.map(|dt| dt.with_timezone(&Utc)),
            scrape_timestamp: row.scrape_timestamp.with_timezone(&Utc),
            created_at: row.created_at.with_timezone(&Utc),
            updated_at: row.updated_at.with_timezone(&Utc),
            status: row.status.clone(),
            duplicate_of_property_id: row.duplicate_of_property_id,
        }
    }
}

/// Decode a JSONB string array column
fn string_array(value: &Value) -> Vec<String> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

/// A page of hits from the search store
#[derive(Debug, Clone)]
pub struct SearchHits {
    pub total: u64,
    pub documents: Vec<SearchDocument>,
}

/// Search store client
#[derive(Clone)]
pub struct SearchStore {
    client: reqwest::Client,
    endpoint: String,
    index: String,
}

impl SearchStore {
    /// Create a new search-store client
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::SearchStoreError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            index: config.index.clone(),
        })
    }

    /// Ensure the index and its mapping exist. Creation races between
    /// workers resolve to "already exists", which is fine.
    pub async fn ensure_index(&self) -> Result<()> {
        let url = format!("{}/{}", self.endpoint, self.index);

        let head = self.client.head(&url).send().await.map_err(|e| {
            AppError::SearchStoreError {
                message: format!("Index existence check failed: {}", e),
            }
        })?;

        if head.status().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .put(&url)
            .json(&index_mapping())
            .send()
            .await
            .map_err(|e| AppError::SearchStoreError {
                message: format!("Index creation failed: {}", e),
            })?;

        if response.status().is_success() {
            tracing::info!(index = %self.index, "Search index created");
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("resource_already_exists_exception") {
            return Ok(());
        }

        Err(AppError::SearchStoreError {
            message: format!("Index creation returned {}: {}", status, body),
        })
    }

    /// Index a listing document keyed by its `source_url`
    pub async fn index_listing(&self, document: &SearchDocument) -> Result<()> {
        let url = format!(
            "{}/{}/_doc/{}",
            self.endpoint,
            self.index,
            encode_doc_id(&document.source_url)
        );

        let response = self
            .client
            .put(&url)
            .json(document)
            .send()
            .await
            .map_err(|e| AppError::SearchStoreError {
                message: format!("Index write failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SearchStoreError {
                message: format!("Index write returned {}: {}", status, body),
            });
        }

        tracing::debug!(source_url = %document.source_url, "Listing indexed");
        Ok(())
    }

    /// Execute a search body and decode hits
    pub async fn search(&self, body: &Value) -> Result<SearchHits> {
        let raw = self.execute(body).await?;

        let total = raw["hits"]["total"]["value"].as_u64().unwrap_or(0);

        let documents = raw["hits"]["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| {
                        serde_json::from_value::<SearchDocument>(hit["_source"].clone()).ok()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SearchHits { total, documents })
    }

    /// Execute a search body and return the raw aggregations object
    pub async fn aggregate(&self, body: &Value) -> Result<Value> {
        let raw = self.execute(body).await?;
        Ok(raw.get("aggregations").cloned().unwrap_or(Value::Null))
    }

    async fn execute(&self, body: &Value) -> Result<Value> {
        let url = format!("{}/{}/_search", self.endpoint, self.index);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::SearchStoreError {
                message: format!("Search request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SearchStoreError {
                message: format!("Search returned {}: {}", status, body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SearchStoreError {
                message: format!("Failed to parse search response: {}", e),
            })
    }

    /// Ping the search store
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| AppError::SearchStoreError {
                message: format!("Ping failed: {}", e),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::SearchStoreError {
                message: format!("Ping returned {}", response.status()),
            })
        }
    }
}

/// Percent-encode a document id so that URLs and other arbitrary strings
/// survive as path segments
fn encode_doc_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// The index mapping for listing documents
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "source_url": { "type": "keyword" },
                "source_name": { "type": "keyword" },
                "title": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } }
                },
                "description": { "type": "text" },
                "images": { "type": "keyword" },

                "price_original_numeric": { "type": "float" },
                "price_original_text": { "type": "keyword" },
                "currency_original": { "type": "keyword" },
                "normalized_price_usd": { "type": "float" },

                "address_raw": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "location_text": { "type": "text" },
                "location_coordinates": { "type": "geo_point" },

                "bedrooms": { "type": "integer" },
                "bathrooms": { "type": "half_float" },
                "area_original_value": { "type": "float" },
                "area_unit_original": { "type": "keyword" },
                "normalized_area_sqft": { "type": "float" },

                "property_type": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "amenities": { "type": "keyword" },

                "date_posted": { "type": "date" },
                "scrape_timestamp": { "type": "date" },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" },

                "status": { "type": "keyword" },
                "duplicate_of_property_id": { "type": "integer" }
            }
        }
    })
}
