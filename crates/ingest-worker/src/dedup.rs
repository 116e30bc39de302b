//! Duplicate-resolution policy
//!
//! The repository returns candidates already filtered (active, other source,
//! inside the lat/lon band, above the similarity threshold) and ordered by
//! descending similarity then descending scrape time. This module decides
//! what that candidate list means for the incoming listing.
//!
//! Dedup marks, it never merges: only the newcomer is annotated, the peer
//! record is untouched. That keeps `duplicate_of_property_id` acyclic and
//! every write single-row.

use homescout_common::db::models::ListingStatus;
use homescout_common::db::DuplicateCandidate;
use homescout_common::normalize::NormalizedListing;

/// Whether the incoming listing carries enough signal to check for
/// duplicates: both coordinates, plus a real title (the hygiene default
/// would blindly match every other untitled listing).
pub fn dedup_eligible(listing: &NormalizedListing) -> bool {
    listing.latitude.is_some()
        && listing.longitude.is_some()
        && listing.title != homescout_common::UNTITLED_LISTING
}

/// Resolve a candidate list into the newcomer's status.
///
/// The best candidate (highest similarity, most recently scraped) becomes
/// the duplicate target; an empty list publishes the listing as active.
pub fn resolve_duplicate(candidates: &[DuplicateCandidate]) -> (ListingStatus, Option<i64>) {
    match candidates.first() {
        Some(best) => (ListingStatus::PotentialDuplicate, Some(best.id)),
        None => (ListingStatus::Active, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(id: i64, similarity: f32) -> DuplicateCandidate {
        DuplicateCandidate {
            id,
            title: "Sunny 2BR".to_string(),
            source_name: "S1".to_string(),
            scrape_timestamp: Utc::now(),
            similarity,
        }
    }

    fn listing_with(latitude: Option<f64>, longitude: Option<f64>, title: &str) -> NormalizedListing {
        let raw: homescout_common::normalize::RawListing =
            serde_json::from_value(serde_json::json!({ "title": title, "source_url": "u" }))
                .unwrap();
        let mut listing = homescout_common::normalize::normalize(raw, Utc::now());
        listing.latitude = latitude;
        listing.longitude = longitude;
        listing
    }

    #[test]
    fn test_empty_candidates_publish_as_active() {
        let (status, duplicate_of) = resolve_duplicate(&[]);
        assert_eq!(status, ListingStatus::Active);
        assert_eq!(duplicate_of, None);
    }

    #[test]
    fn test_best_candidate_wins() {
        let candidates = vec![candidate(11, 0.95), candidate(7, 0.81)];
        let (status, duplicate_of) = resolve_duplicate(&candidates);

        assert_eq!(status, ListingStatus::PotentialDuplicate);
        assert_eq!(duplicate_of, Some(11));
    }

    #[test]
    fn test_eligibility_requires_both_coordinates() {
        assert!(dedup_eligible(&listing_with(
            Some(47.6),
            Some(-122.3),
            "Sunny 2BR"
        )));
        assert!(!dedup_eligible(&listing_with(Some(47.6), None, "Sunny 2BR")));
        assert!(!dedup_eligible(&listing_with(None, None, "Sunny 2BR")));
    }

    #[test]
    fn test_untitled_listings_are_not_checked() {
        let raw: homescout_common::normalize::RawListing =
            serde_json::from_value(serde_json::json!({ "source_url": "u" })).unwrap();
        let mut listing = homescout_common::normalize::normalize(raw, Utc::now());
        listing.latitude = Some(47.6);
        listing.longitude = Some(-122.3);

        assert!(!dedup_eligible(&listing));
    }
}
