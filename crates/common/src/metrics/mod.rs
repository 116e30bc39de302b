//! Metrics and observability utilities
//!
//! Provides metric registration and record helpers with standardized
//! naming conventions across the ingest worker and the gateway.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Homescout metrics
pub const METRICS_PREFIX: &str = "homescout";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Ingest metrics
    describe_counter!(
        format!("{}_messages_consumed_total", METRICS_PREFIX),
        Unit::Count,
        "Total queue messages consumed"
    );

    describe_counter!(
        format!("{}_messages_acked_total", METRICS_PREFIX),
        Unit::Count,
        "Total queue messages acknowledged"
    );

    describe_counter!(
        format!("{}_messages_nacked_total", METRICS_PREFIX),
        Unit::Count,
        "Total queue messages rejected without requeue"
    );

    describe_counter!(
        format!("{}_geocoder_lookups_total", METRICS_PREFIX),
        Unit::Count,
        "Total geocoder lookups"
    );

    describe_counter!(
        format!("{}_duplicates_flagged_total", METRICS_PREFIX),
        Unit::Count,
        "Listings marked as potential duplicates"
    );

    describe_counter!(
        format!("{}_listings_upserted_total", METRICS_PREFIX),
        Unit::Count,
        "Listings written to the master store"
    );

    describe_counter!(
        format!("{}_listings_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Listings written to the search index"
    );

    describe_histogram!(
        format!("{}_ingest_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end message processing latency in seconds"
    );

    // API metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search store query latency in seconds"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_rate_limited_total", METRICS_PREFIX),
        Unit::Count,
        "Requests rejected by the rate limiter"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one consumed message and its outcome
pub fn record_message_outcome(acked: bool, duration_secs: f64) {
    counter!(format!("{}_messages_consumed_total", METRICS_PREFIX)).increment(1);

    if acked {
        counter!(format!("{}_messages_acked_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_messages_nacked_total", METRICS_PREFIX)).increment(1);
    }

    histogram!(format!("{}_ingest_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Record a geocoder lookup
pub fn record_geocoder_lookup(resolved: bool) {
    let outcome = if resolved { "resolved" } else { "unresolved" };
    counter!(
        format!("{}_geocoder_lookups_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a duplicate flag
pub fn record_duplicate_flagged() {
    counter!(format!("{}_duplicates_flagged_total", METRICS_PREFIX)).increment(1);
}

/// Record dual-store writes
pub fn record_listing_written(indexed: bool) {
    counter!(format!("{}_listings_upserted_total", METRICS_PREFIX)).increment(1);
    if indexed {
        counter!(format!("{}_listings_indexed_total", METRICS_PREFIX)).increment(1);
    }
}

/// Record search store query latency
pub fn record_search(duration_secs: f64, endpoint: &str) {
    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

/// Record a cache lookup
pub fn record_cache(hit: bool, cache_name: &str) {
    let metric = if hit {
        format!("{}_cache_hits_total", METRICS_PREFIX)
    } else {
        format!("{}_cache_misses_total", METRICS_PREFIX)
    };

    counter!(metric, "cache" => cache_name.to_string()).increment(1);
}

/// Record a rate-limited request
pub fn record_rate_limited() {
    counter!(format!("{}_rate_limited_total", METRICS_PREFIX)).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/properties");
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish(200);
        // Just verify it runs without panic
    }
}
