//! Homescout Ingest Worker
//!
//! Consumes raw listing messages from the durable queue and runs each one
//! through the pipeline:
//! 1. Parse and normalize the payload
//! 2. Geocode the address (best-effort)
//! 3. Check the master store for likely duplicates
//! 4. Upsert the master row, then index the search document
//!
//! One message in flight per worker instance; scale out by running more
//! instances. Failed messages are nacked without requeue.

mod dedup;
mod processor;

use crate::processor::IngestProcessor;
use homescout_common::{
    config::AppConfig,
    db::DbPool,
    geocode::create_geocoder,
    metrics,
    queue::Queue,
    search::SearchStore,
    VERSION,
};
use std::time::Instant;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Homescout Ingest Worker v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    // Initialize metrics
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Initialize search store and make sure the index exists before the
    // first write
    let search = SearchStore::new(&config.search)?;
    search.ensure_index().await?;

    // Initialize geocoder
    let geocoder = create_geocoder(&config.geocoder);
    info!(provider = geocoder.provider_name(), "Geocoder initialized");

    // Initialize queue
    let queue = Queue::new(&config.queue).await?;

    let processor = IngestProcessor::new(db, search, geocoder, config.dedup.clone());

    info!("Ingest worker ready, starting queue polling...");

    // Circuit breaker state for queue-level failures
    let mut consecutive_failures = 0;
    const MAX_FAILURES: u32 = 5;
    const CIRCUIT_BREAK_DURATION: std::time::Duration = std::time::Duration::from_secs(30);

    loop {
        // Circuit breaker check
        if consecutive_failures >= MAX_FAILURES {
            warn!(
                failures = consecutive_failures,
                "Circuit breaker open, pausing..."
            );
            tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset, resuming...");
        }

        tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
                break;
            }
            result = queue.receive_one() => {
                match result {
                    Ok(Some(message)) => {
                        consecutive_failures = 0;
                        let started = Instant::now();

                        // The current message always completes (ack or nack)
                        // before the loop re-checks the shutdown signal
                        let acked = match Queue::parse_body(&message) {
                            Err(e) => {
                                // A payload we cannot read is a poison
                                // message; requeueing it would loop forever
                                error!(error = %e, "Dropping malformed message");
                                if let Err(nack_err) = queue.nack(&message, "malformed_payload").await {
                                    error!(error = %nack_err, "Failed to nack message");
                                }
                                false
                            }
                            Ok(raw) => match processor.process(raw).await {
                                Ok(outcome) => {
                                    if let Err(e) = queue.ack(&message).await {
                                        error!(error = %e, source_url = %outcome.source_url, "Failed to ack message");
                                    }
                                    true
                                }
                                Err(e) => {
                                    error!(kind = e.kind(), error = %e, "Message processing failed");
                                    if let Err(nack_err) = queue.nack(&message, e.kind()).await {
                                        error!(error = %nack_err, "Failed to nack message");
                                    }
                                    false
                                }
                            },
                        };

                        metrics::record_message_outcome(acked, started.elapsed().as_secs_f64());
                    }
                    Ok(None) => {
                        // Queue empty for the whole poll window
                        consecutive_failures = 0;
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(error = %e, "Failed to receive message from queue");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    info!("Ingest worker shutting down");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
