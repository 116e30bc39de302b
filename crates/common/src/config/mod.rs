//! Configuration management for Homescout services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration (gateway)
    pub server: ServerConfig,

    /// Relational master store configuration
    pub database: DatabaseConfig,

    /// Search index configuration
    pub search: SearchConfig,

    /// Redis cache configuration
    pub cache: CacheConfig,

    /// Queue configuration (SQS)
    pub queue: QueueConfig,

    /// Geocoder configuration
    pub geocoder: GeocoderConfig,

    /// Duplicate-detection thresholds
    pub dedup: DedupConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Search store base URL
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Index holding listing documents
    #[serde(default = "default_index_name")]
    pub index: String,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Redis URL
    #[serde(default = "default_cache_url")]
    pub url: String,

    /// TTL for /properties responses in seconds
    #[serde(default = "default_properties_ttl")]
    pub properties_ttl_secs: u64,

    /// TTL for /properties/filters/metadata responses in seconds
    #[serde(default = "default_metadata_ttl")]
    pub metadata_ttl_secs: u64,

    /// Key prefix for namespacing
    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// SQS queue URL for raw listing messages
    pub listings_queue_url: Option<String>,

    /// Dead letter queue URL for failed messages
    pub dlq_url: Option<String>,

    /// Long polling timeout in seconds
    #[serde(default = "default_queue_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Visibility timeout in seconds
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocoderConfig {
    /// Geocoder provider: nominatim, mock
    #[serde(default = "default_geocoder_provider")]
    pub provider: String,

    /// API key, for providers that require one
    pub api_key: Option<String>,

    /// API base URL (for self-hosted instances)
    pub api_base: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_geocoder_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_geocoder_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DedupConfig {
    /// Latitude band half-width in degrees
    #[serde(default = "default_lat_threshold")]
    pub lat_threshold: f64,

    /// Longitude band half-width in degrees
    #[serde(default = "default_lon_threshold")]
    pub lon_threshold: f64,

    /// Minimum trigram title similarity
    #[serde(default = "default_similarity_threshold")]
    pub title_similarity_threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Allowed requests per window (per client IP)
    #[serde(default = "default_rate_limit_points")]
    pub points: u32,

    /// Window length in seconds
    #[serde(default = "default_rate_limit_duration")]
    pub duration_secs: u64,

    /// Enable rate limiting
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_search_endpoint() -> String { "http://localhost:9200".to_string() }
fn default_index_name() -> String { crate::DEFAULT_INDEX_NAME.to_string() }
fn default_search_timeout() -> u64 { 10 }
fn default_cache_url() -> String { "redis://localhost:6379".to_string() }
fn default_properties_ttl() -> u64 { 300 }
fn default_metadata_ttl() -> u64 { 600 }
fn default_cache_prefix() -> String { "homescout".to_string() }
fn default_queue_poll_timeout() -> u64 { 20 }
fn default_visibility_timeout() -> u64 { 300 }
fn default_geocoder_provider() -> String { "nominatim".to_string() }
fn default_geocoder_timeout() -> u64 { 10 }
fn default_geocoder_retries() -> u32 { 3 }
fn default_lat_threshold() -> f64 { 1e-4 }
fn default_lon_threshold() -> f64 { 1e-4 }
fn default_similarity_threshold() -> f64 { 0.6 }
fn default_rate_limit_points() -> u32 { 100 }
fn default_rate_limit_duration() -> u64 { 60 }
fn default_rate_limit_enabled() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "homescout".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("database.url", "postgres://localhost/homescout")?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/homescout".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            search: SearchConfig {
                endpoint: default_search_endpoint(),
                index: default_index_name(),
                timeout_secs: default_search_timeout(),
            },
            cache: CacheConfig {
                url: default_cache_url(),
                properties_ttl_secs: default_properties_ttl(),
                metadata_ttl_secs: default_metadata_ttl(),
                key_prefix: default_cache_prefix(),
            },
            queue: QueueConfig {
                listings_queue_url: None,
                dlq_url: None,
                poll_timeout_secs: default_queue_poll_timeout(),
                visibility_timeout_secs: default_visibility_timeout(),
            },
            geocoder: GeocoderConfig {
                provider: default_geocoder_provider(),
                api_key: None,
                api_base: None,
                timeout_secs: default_geocoder_timeout(),
                max_retries: default_geocoder_retries(),
            },
            dedup: DedupConfig {
                lat_threshold: default_lat_threshold(),
                lon_threshold: default_lon_threshold(),
                title_similarity_threshold: default_similarity_threshold(),
            },
            rate_limit: RateLimitConfig {
                points: default_rate_limit_points(),
                duration_secs: default_rate_limit_duration(),
                enabled: default_rate_limit_enabled(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.search.index, "properties");
        assert_eq!(config.cache.properties_ttl_secs, 300);
        assert_eq!(config.cache.metadata_ttl_secs, 600);
    }

    #[test]
    fn test_default_rate_limit_window() {
        let config = AppConfig::default();
        assert_eq!(config.rate_limit.points, 100);
        assert_eq!(config.rate_limit.duration_secs, 60);
    }

    #[test]
    fn test_default_dedup_thresholds() {
        let config = AppConfig::default();
        assert_eq!(config.dedup.lat_threshold, 1e-4);
        assert_eq!(config.dedup.lon_threshold, 1e-4);
        assert_eq!(config.dedup.title_similarity_threshold, 0.6);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/homescout");
    }
}
