//! Repository pattern for master-store operations
//!
//! The interesting statements here are raw SQL: the ORM cannot express the
//! `ON CONFLICT` upsert keyed on `source_url` or the pg_trgm similarity
//! filter, so both go through `Statement::from_sql_and_values`.

use crate::config::DedupConfig;
use crate::errors::{AppError, Result};
use crate::db::models::Listing;
use crate::db::DbPool;
use crate::normalize::NormalizedListing;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement};
use serde::{Deserialize, Serialize};

/// A potential-duplicate candidate from the master store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub id: i64,
    pub title: String,
    pub source_name: String,
    pub scrape_timestamp: DateTime<Utc>,
    /// Trigram title similarity in [0, 1]
    pub similarity: f32,
}

/// Upper bound on duplicate candidates fetched per lookup
const MAX_DUPLICATE_CANDIDATES: u64 = 10;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Listing Operations
    // ========================================================================

    /// Upsert a normalized listing keyed on `source_url` and return the
    /// stored row.
    ///
    /// Insert if absent, otherwise update every normalized field in place and
    /// bump `updated_at`. The unique constraint on `source_url` is the
    /// correctness anchor: re-delivery of the same message converges to a
    /// single row. The search document is projected from the returned row,
    /// never from the input, so the index always mirrors what the master
    /// actually stored.
    pub async fn upsert_listing(&self, listing: &NormalizedListing) -> Result<Listing> {
        let images = serde_json::to_value(&listing.images)?;
        let amenities = serde_json::to_value(&listing.amenities)?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO properties (
                source_url, source_name, title, description, images,
                price_original_numeric, price_original_text, currency_original,
                normalized_price_usd,
                address_raw, location_text, latitude, longitude, geocoded_payload,
                bedrooms, bathrooms,
                area_original_value, area_unit_original, normalized_area_sqft,
                property_type, amenities, date_posted, scrape_timestamp,
                status, duplicate_of_property_id,
                created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8,
                $9,
                $10, $11, $12, $13, $14,
                $15, $16,
                $17, $18, $19,
                $20, $21, $22, $23,
                $24, $25,
                NOW(), NOW()
            )
            ON CONFLICT (source_url) DO UPDATE SET
                source_name = EXCLUDED.source_name,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                images = EXCLUDED.images,
                price_original_numeric = EXCLUDED.price_original_numeric,
                price_original_text = EXCLUDED.price_original_text,
                currency_original = EXCLUDED.currency_original,
                normalized_price_usd = EXCLUDED.normalized_price_usd,
                address_raw = EXCLUDED.address_raw,
                location_text = EXCLUDED.location_text,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                geocoded_payload = EXCLUDED.geocoded_payload,
                bedrooms = EXCLUDED.bedrooms,
                bathrooms = EXCLUDED.bathrooms,
                area_original_value = EXCLUDED.area_original_value,
                area_unit_original = EXCLUDED.area_unit_original,
                normalized_area_sqft = EXCLUDED.normalized_area_sqft,
                property_type = EXCLUDED.property_type,
                amenities = EXCLUDED.amenities,
                date_posted = EXCLUDED.date_posted,
                scrape_timestamp = EXCLUDED.scrape_timestamp,
                status = EXCLUDED.status,
                duplicate_of_property_id = EXCLUDED.duplicate_of_property_id,
                updated_at = NOW()
            RETURNING *
            "#,
            vec![
                listing.source_url.clone().into(),
                listing.source_name.clone().into(),
                listing.title.clone().into(),
                listing.description.clone().into(),
                images.into(),
                listing.price_original_numeric.into(),
                listing.price_original_text.clone().into(),
                listing.currency_original.clone().into(),
                listing.normalized_price_usd.into(),
                listing.address_raw.clone().into(),
                listing.location_text.clone().into(),
                listing.latitude.into(),
                listing.longitude.into(),
                listing.geocoded_payload.clone().into(),
                listing.bedrooms.into(),
                listing.bathrooms.into(),
                listing.area_original_value.into(),
                listing.area_unit_original.clone().into(),
                listing.normalized_area_sqft.into(),
                listing.property_type.clone().into(),
                amenities.into(),
                listing.date_posted.into(),
                listing.scrape_timestamp.into(),
                listing.status.as_str().into(),
                listing.duplicate_of_property_id.into(),
            ],
        );

        let row = self
            .write_conn()
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Upsert returned no row".to_string(),
            })?;

        Listing::from_query_result(&row, "").map_err(Into::into)
    }

    // ========================================================================
    // Duplicate Search
    // ========================================================================

    /// Find active listings from other sources that plausibly describe the
    /// same property: coordinates within the configured lat/lon band and
    /// trigram title similarity at or above the threshold.
    ///
    /// Candidates are ordered by descending similarity, then by descending
    /// scrape time, so the first element is the best duplicate target.
    pub async fn find_duplicate_candidates(
        &self,
        title: &str,
        source_name: &str,
        latitude: f64,
        longitude: f64,
        config: &DedupConfig,
    ) -> Result<Vec<DuplicateCandidate>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT
                id,
                title,
                source_name,
                scrape_timestamp,
                similarity(title, $1) AS title_similarity
            FROM properties
            WHERE status = 'active'
              AND source_name <> $2
              AND latitude IS NOT NULL
              AND longitude IS NOT NULL
              AND abs(latitude - $3) <= $4
              AND abs(longitude - $5) <= $6
              AND similarity(title, $1) >= $7
            ORDER BY title_similarity DESC, scrape_timestamp DESC
            LIMIT $8
            "#,
            vec![
                title.into(),
                source_name.into(),
                latitude.into(),
                config.lat_threshold.into(),
                longitude.into(),
                config.lon_threshold.into(),
                (config.title_similarity_threshold as f32).into(),
                (MAX_DUPLICATE_CANDIDATES as i64).into(),
            ],
        );

        let rows = self.read_conn().query_all(stmt).await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            candidates.push(DuplicateCandidate {
                id: row.try_get_by_index::<i64>(0)?,
                title: row.try_get_by_index::<String>(1)?,
                source_name: row.try_get_by_index::<String>(2)?,
                scrape_timestamp: row
                    .try_get_by_index::<chrono::DateTime<chrono::FixedOffset>>(3)?
                    .with_timezone(&Utc),
                similarity: row.try_get_by_index::<f32>(4)?,
            });
        }

        Ok(candidates)
    }
}
