//! Listing entity
//!
//! One row per property observation, keyed by `source_url`. Re-ingest of the
//! same `source_url` updates the row in place.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "properties")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Globally unique across sources; the upsert anchor
    #[sea_orm(column_type = "Text", unique)]
    pub source_url: String,

    #[sea_orm(column_type = "Text")]
    pub source_name: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Ordered image URLs as a JSONB array
    #[sea_orm(column_type = "JsonBinary")]
    pub images: Json,

    pub price_original_numeric: Option<f64>,

    /// Opaque display string as scraped, e.g. "$2,000/month"
    #[sea_orm(column_type = "Text", nullable)]
    pub price_original_text: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub currency_original: Option<String>,

    pub normalized_price_usd: Option<f64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub address_raw: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub location_text: Option<String>,

    // latitude and longitude are both present or both absent
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Full geocoder response, kept verbatim
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub geocoded_payload: Option<Json>,

    /// 0 denotes a studio
    pub bedrooms: Option<i32>,

    /// Half-steps, e.g. 2.5
    pub bathrooms: Option<f64>,

    pub area_original_value: Option<f64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub area_unit_original: Option<String>,

    pub normalized_area_sqft: Option<f64>,

    /// Normalized lower-case, free-form
    #[sea_orm(column_type = "Text", nullable)]
    pub property_type: Option<String>,

    /// Set of amenity strings as a JSONB array; stored order insignificant
    #[sea_orm(column_type = "JsonBinary")]
    pub amenities: Json,

    pub date_posted: Option<DateTimeWithTimeZone>,

    pub scrape_timestamp: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub duplicate_of_property_id: Option<i64>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Listing lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    PotentialDuplicate,
    Merged,
    Inactive,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::PotentialDuplicate => "potential_duplicate",
            ListingStatus::Merged => "merged",
            ListingStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListingStatus::Active),
            "potential_duplicate" => Some(ListingStatus::PotentialDuplicate),
            "merged" => Some(ListingStatus::Merged),
            "inactive" => Some(ListingStatus::Inactive),
            _ => None,
        }
    }
}

impl From<ListingStatus> for String {
    fn from(status: ListingStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ListingStatus::Active,
            ListingStatus::PotentialDuplicate,
            ListingStatus::Merged,
            ListingStatus::Inactive,
        ] {
            assert_eq!(ListingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ListingStatus::parse("deleted"), None);
    }
}
