//! Homescout Common Library
//!
//! Shared code for the Homescout services including:
//! - Database models and repository patterns
//! - Search-store client and query building
//! - Normalization helpers for raw listing text
//! - Geocoder client abstraction
//! - Error types and handling
//! - Configuration management
//! - Caching and queue adapters
//! - Metrics and observability

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod geocode;
pub mod metrics;
pub mod normalize;
pub mod queue;
pub mod search;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use geocode::Geocoder;
pub use search::SearchStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Title given to listings that arrive without one
pub const UNTITLED_LISTING: &str = "Untitled Listing";

/// Default durable queue the scraping workers publish into
pub const DEFAULT_QUEUE_NAME: &str = "property_listings_raw";

/// Default search index holding the listing documents
pub const DEFAULT_INDEX_NAME: &str = "properties";
