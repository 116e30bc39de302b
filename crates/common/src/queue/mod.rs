//! SQS queue adapter for the listing intake
//!
//! Provides:
//! - Prefetch-1 consumption with manual acknowledgement
//! - Nack without requeue (dead-letter forward when configured)
//! - Parsing of the raw listing message contract
//!
//! Requeue is deliberately disabled: a listing that fails processing would
//! fail identically on redelivery, and poison messages must not wedge the
//! queue. Operators who need failure retention point `dlq_url` at a
//! dead-letter queue.

use crate::config::QueueConfig;
use crate::errors::{AppError, Result};
use aws_config::timeout::TimeoutConfig;
use aws_sdk_sqs::Client as SqsClient;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

/// A received message awaiting ack or nack
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
}

/// SQS queue adapter
pub struct Queue {
    client: SqsClient,
    queue_url: String,
    dlq_url: Option<String>,
    poll_timeout_secs: i32,
    visibility_timeout_secs: i32,
}

impl Queue {
    /// Create a new queue adapter. Fails if no queue URL is configured.
    pub async fn new(config: &QueueConfig) -> Result<Self> {
        let queue_url = config
            .listings_queue_url
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "queue.listings_queue_url is not set".to_string(),
            })?;

        // Bound every queue round-trip; the long poll needs headroom on top
        // of its wait time
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build();

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .timeout_config(timeouts)
            .load()
            .await;
        let client = SqsClient::new(&aws_config);

        Ok(Self {
            client,
            queue_url,
            dlq_url: config.dlq_url.clone(),
            poll_timeout_secs: config.poll_timeout_secs as i32,
            visibility_timeout_secs: config.visibility_timeout_secs as i32,
        })
    }

    /// Receive at most one message. Long-polls up to the configured wait
    /// time; `None` means the queue was empty for the whole window.
    ///
    /// One message at a time bounds per-listing geocoder pressure per
    /// worker; scale by running more worker instances.
    pub async fn receive_one(&self) -> Result<Option<QueueMessage>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .visibility_timeout(self.visibility_timeout_secs)
            .wait_time_seconds(self.poll_timeout_secs)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive message: {}", e),
            })?;

        let Some(message) = result.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let receipt_handle = message.receipt_handle.ok_or_else(|| AppError::QueueError {
            message: "Message has no receipt handle".to_string(),
        })?;

        let body = message.body.unwrap_or_default();

        debug!("Received message from queue");
        Ok(Some(QueueMessage {
            body,
            receipt_handle,
        }))
    }

    /// Acknowledge a processed message
    pub async fn ack(&self, message: &QueueMessage) -> Result<()> {
        self.delete(&message.receipt_handle).await?;
        debug!("Message acked");
        Ok(())
    }

    /// Reject a message without requeueing it.
    ///
    /// The raw body is forwarded to the dead-letter queue when one is
    /// configured; either way the message is removed from the main queue so
    /// it cannot loop.
    pub async fn nack(&self, message: &QueueMessage, reason: &str) -> Result<()> {
        error!(reason, "Nacking message without requeue");

        if let Some(ref dlq_url) = self.dlq_url {
            let forwarded = self
                .client
                .send_message()
                .queue_url(dlq_url)
                .message_body(&message.body)
                .send()
                .await;

            if let Err(e) = forwarded {
                // The message is still dropped from the main queue; a DLQ
                // outage must not resurrect a poison message
                error!(error = %e, "Failed to forward message to dead-letter queue");
            }
        }

        self.delete(&message.receipt_handle).await?;
        Ok(())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        Ok(())
    }

    /// Parse a message body as JSON
    pub fn parse_body<T: DeserializeOwned>(message: &QueueMessage) -> Result<T> {
        serde_json::from_str(&message.body).map_err(|e| AppError::MalformedMessage {
            message: format!("Failed to parse message: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RawListing;

    #[test]
    fn test_parse_body_accepts_listing_message() {
        let message = QueueMessage {
            body: r#"{"source_url":"u1","title":"Sunny 2BR","source_name":"S1"}"#.to_string(),
            receipt_handle: "rh".to_string(),
        };

        let raw: RawListing = Queue::parse_body(&message).unwrap();
        assert_eq!(raw.source_url.as_deref(), Some("u1"));
        assert_eq!(raw.title.as_deref(), Some("Sunny 2BR"));
    }

    #[test]
    fn test_parse_body_rejects_malformed_json() {
        let message = QueueMessage {
            body: "not json".to_string(),
            receipt_handle: "rh".to_string(),
        };

        let err = Queue::parse_body::<RawListing>(&message).unwrap_err();
        assert!(matches!(err, AppError::MalformedMessage { .. }));
    }

    #[test]
    fn test_parse_body_rejects_wrong_shape() {
        // An array is not a listing object
        let message = QueueMessage {
            body: "[1, 2, 3]".to_string(),
            receipt_handle: "rh".to_string(),
        };

        assert!(Queue::parse_body::<RawListing>(&message).is_err());
    }
}
