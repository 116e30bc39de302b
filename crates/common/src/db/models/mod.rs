//! Entity models for the listing master store

pub mod listing;

pub use listing::{
    ActiveModel as ListingActiveModel, Column as ListingColumn, Entity as ListingEntity,
    ListingStatus, Model as Listing,
};
