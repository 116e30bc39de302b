//! Geocoder service abstraction
//!
//! Provides a unified interface over geocoding providers:
//! - Nominatim (default, works against the public instance or a self-hosted one)
//! - Mock (tests and offline development)
//!
//! Geocoding is best-effort everywhere it is used: a failure or an empty
//! candidate list never fails the ingest pipeline, it only leaves the
//! coordinates absent.

use crate::config::GeocoderConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// A successful geocoder lookup: the first candidate's coordinates plus the
/// provider's full response, kept verbatim for the master record.
#[derive(Debug, Clone)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub payload: serde_json::Value,
}

/// Trait for geocoding providers
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve an address to coordinates. `Ok(None)` means the provider
    /// answered but had no candidates.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Nominatim geocoding client
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct NominatimCandidate {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    /// Create a new Nominatim client
    pub fn new(base_url: Option<String>, timeout: Duration, max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("homescout/{}", crate::VERSION))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string()),
            max_retries,
        }
    }

    /// Make request with retry
    async fn request_with_retry(&self, address: &str) -> Result<Option<GeocodeResult>> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(address).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Geocoder request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::GeocoderError {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, address: &str) -> Result<Option<GeocodeResult>> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "jsonv2"), ("limit", "3")])
            .send()
            .await
            .map_err(|e| AppError::GeocoderError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GeocoderError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| AppError::GeocoderError {
                message: format!("Failed to parse response: {}", e),
            })?;

        let candidates: Vec<NominatimCandidate> =
            serde_json::from_value(payload.clone()).map_err(|e| AppError::GeocoderError {
                message: format!("Unexpected response shape: {}", e),
            })?;

        let Some(first) = candidates.first() else {
            return Ok(None);
        };

        let (Ok(latitude), Ok(longitude)) = (first.lat.parse::<f64>(), first.lon.parse::<f64>())
        else {
            return Err(AppError::GeocoderError {
                message: format!("Non-numeric coordinates: {}/{}", first.lat, first.lon),
            });
        };

        Ok(Some(GeocodeResult {
            latitude,
            longitude,
            payload,
        }))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
        self.request_with_retry(address).await
    }

    fn provider_name(&self) -> &str {
        "nominatim"
    }
}

/// Mock geocoder for testing
pub struct MockGeocoder {
    result: Option<(f64, f64)>,
}

impl MockGeocoder {
    /// A mock that always resolves to the given coordinates
    pub fn resolving_to(latitude: f64, longitude: f64) -> Self {
        Self {
            result: Some((latitude, longitude)),
        }
    }

    /// A mock that never finds candidates
    pub fn empty() -> Self {
        Self { result: None }
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
        Ok(self.result.map(|(latitude, longitude)| GeocodeResult {
            latitude,
            longitude,
            payload: serde_json::json!([{
                "display_name": address,
                "lat": latitude.to_string(),
                "lon": longitude.to_string(),
            }]),
        }))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// Create a geocoder based on configuration
pub fn create_geocoder(config: &GeocoderConfig) -> Arc<dyn Geocoder> {
    match config.provider.as_str() {
        "nominatim" => Arc::new(NominatimGeocoder::new(
            config.api_base.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )),
        "mock" => Arc::new(MockGeocoder::resolving_to(47.6062, -122.3321)),
        other => {
            tracing::warn!(provider = other, "Unknown geocoder provider, using mock");
            Arc::new(MockGeocoder::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_geocoder_resolves() {
        let geocoder = MockGeocoder::resolving_to(47.6062, -122.3321);
        let result = geocoder.geocode("Seattle, WA").await.unwrap().unwrap();

        assert_eq!(result.latitude, 47.6062);
        assert_eq!(result.longitude, -122.3321);
        assert!(result.payload.is_array());
    }

    #[tokio::test]
    async fn test_mock_geocoder_empty() {
        let geocoder = MockGeocoder::empty();
        assert!(geocoder.geocode("nowhere").await.unwrap().is_none());
    }

    #[test]
    fn test_candidate_parsing() {
        let payload = serde_json::json!([
            {"lat": "47.6062", "lon": "-122.3321", "display_name": "Seattle"}
        ]);
        let candidates: Vec<NominatimCandidate> = serde_json::from_value(payload).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].lat, "47.6062");
    }
}
