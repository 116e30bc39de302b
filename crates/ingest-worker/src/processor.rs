//! Ingest processor
//!
//! Runs the per-message pipeline: normalize, enrich, duplicate-mark, then
//! write to both stores. The relational write always precedes the index
//! write; a search-store failure leaves the master row in place and fails
//! the message, so redelivery converges both stores.

use crate::dedup;
use chrono::Utc;
use homescout_common::config::DedupConfig;
use homescout_common::db::{DbPool, Repository};
use homescout_common::geocode::Geocoder;
use homescout_common::metrics;
use homescout_common::normalize::{normalize, NormalizedListing, RawListing};
use homescout_common::search::{SearchDocument, SearchStore};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What processing a message produced, for logging at the loop level
#[derive(Debug)]
pub struct IngestOutcome {
    pub property_id: i64,
    pub source_url: String,
    pub status: &'static str,
}

/// Ingest pipeline processor
pub struct IngestProcessor {
    repository: Repository,
    search: SearchStore,
    geocoder: Arc<dyn Geocoder>,
    dedup_config: DedupConfig,
}

impl IngestProcessor {
    pub fn new(
        db_pool: DbPool,
        search: SearchStore,
        geocoder: Arc<dyn Geocoder>,
        dedup_config: DedupConfig,
    ) -> Self {
        Self {
            repository: Repository::new(db_pool),
            search,
            geocoder,
            dedup_config,
        }
    }

    /// Process one parsed message end to end
    #[instrument(skip(self, raw))]
    pub async fn process(&self, raw: RawListing) -> Result<IngestOutcome, IngestError> {
        let mut listing = normalize(raw, Utc::now());

        self.enrich(&mut listing).await;
        self.mark_duplicates(&mut listing).await;

        // Relational write first; the search index is a derived view
        // projected from the stored row
        let row = self
            .repository
            .upsert_listing(&listing)
            .await
            .map_err(|e| IngestError::Database(e.to_string()))?;

        let document = SearchDocument::project(&row);
        let index_result = self.search.index_listing(&document).await;
        metrics::record_listing_written(index_result.is_ok());
        index_result.map_err(|e| IngestError::SearchIndex(e.to_string()))?;

        info!(
            property_id = row.id,
            source_url = %row.source_url,
            status = %row.status,
            "Listing ingested"
        );

        Ok(IngestOutcome {
            property_id: row.id,
            source_url: row.source_url,
            status: listing.status.as_str(),
        })
    }

    /// Geocode the address, best-effort. Failures and empty results leave
    /// the coordinates absent and never fail the pipeline.
    async fn enrich(&self, listing: &mut NormalizedListing) {
        let Some(address) = listing.address_raw.clone() else {
            return;
        };

        match self.geocoder.geocode(&address).await {
            Ok(Some(result)) => {
                listing.latitude = Some(result.latitude);
                listing.longitude = Some(result.longitude);
                listing.geocoded_payload = Some(result.payload);
                metrics::record_geocoder_lookup(true);
            }
            Ok(None) => {
                metrics::record_geocoder_lookup(false);
            }
            Err(e) => {
                warn!(error = %e, address = %address, "Geocoding failed, proceeding without coordinates");
                metrics::record_geocoder_lookup(false);
            }
        }
    }

    /// Check the master store for likely duplicates and annotate the
    /// newcomer. Query failures degrade to "no candidates": publishing a
    /// listing as active is the safe default.
    async fn mark_duplicates(&self, listing: &mut NormalizedListing) {
        if !dedup::dedup_eligible(listing) {
            return;
        }

        // Eligibility guarantees both coordinates
        let (latitude, longitude) = (listing.latitude.unwrap(), listing.longitude.unwrap());

        let candidates = match self
            .repository
            .find_duplicate_candidates(
                &listing.title,
                &listing.source_name,
                latitude,
                longitude,
                &self.dedup_config,
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Duplicate lookup failed, treating as no candidates");
                Vec::new()
            }
        };

        let (status, duplicate_of) = dedup::resolve_duplicate(&candidates);
        listing.status = status;
        listing.duplicate_of_property_id = duplicate_of;

        if let Some(peer) = duplicate_of {
            metrics::record_duplicate_flagged();
            info!(
                source_url = %listing.source_url,
                duplicate_of = peer,
                candidates = candidates.len(),
                "Listing flagged as potential duplicate"
            );
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Search index error: {0}")]
    SearchIndex(String),
}

impl IngestError {
    /// Short tag for logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Database(_) => "database",
            IngestError::SearchIndex(_) => "search_index",
        }
    }
}
