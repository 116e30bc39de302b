//! Per-IP rate limiting middleware
//!
//! Token budget per client IP held in Redis: `points` requests per
//! `duration` window, counted with INCR and expired with the window. The
//! limiter protects capacity, not correctness: every Redis failure fails
//! open, and the degraded state is logged.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use homescout_common::config::RateLimitConfig;
use homescout_common::errors::AppError;
use homescout_common::metrics;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use std::net::SocketAddr;
use tracing::warn;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

/// Redis-backed fixed-window limiter keyed by client IP
#[derive(Clone)]
pub struct RateLimiter {
    connection: Option<MultiplexedConnection>,
    points: u32,
    duration_secs: u64,
    enabled: bool,
}

impl RateLimiter {
    /// Connect the limiter to its backing store. An unreachable Redis
    /// produces a degraded limiter that lets everything through.
    pub async fn connect(redis_url: &str, config: &RateLimitConfig) -> Self {
        let connection = if config.enabled {
            match Self::open(redis_url).await {
                Ok(conn) => Some(conn),
                Err(e) => {
                    warn!(error = %e, "Rate limit store unavailable, limiter degraded to fail-open");
                    None
                }
            }
        } else {
            None
        };

        Self {
            connection,
            points: config.points,
            duration_secs: config.duration_secs,
            enabled: config.enabled,
        }
    }

    async fn open(redis_url: &str) -> Result<MultiplexedConnection, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        client
            .get_multiplexed_async_connection_with_timeouts(
                std::time::Duration::from_secs(2),
                std::time::Duration::from_secs(5),
            )
            .await
    }

    /// Check and consume one allowance for the given client IP
    pub async fn check(&self, client_ip: &str) -> RateDecision {
        if !self.enabled {
            return RateDecision::Allowed;
        }

        let Some(connection) = self.connection.clone() else {
            return RateDecision::Allowed;
        };

        match self.count(connection, client_ip).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Rate limit check failed, failing open");
                RateDecision::Allowed
            }
        }
    }

    async fn count(
        &self,
        mut conn: MultiplexedConnection,
        client_ip: &str,
    ) -> Result<RateDecision, redis::RedisError> {
        let key = format!("ratelimit:{}", client_ip);

        let count: u64 = conn.incr(&key, 1).await?;

        if count == 1 {
            let _: bool = conn.expire(&key, self.duration_secs as i64).await?;
        }

        if count <= u64::from(self.points) {
            return Ok(RateDecision::Allowed);
        }

        // Remaining window, reported in whole seconds. A missing TTL (the
        // key expired between the INCR and here) still yields a sane hint.
        let ttl: i64 = conn.ttl(&key).await?;
        let retry_after_secs = if ttl > 0 {
            ttl as u64
        } else {
            self.duration_secs.max(1)
        };

        Ok(RateDecision::Limited { retry_after_secs })
    }
}

/// Rate limiting middleware, applied to every request
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = client_ip(&request, addr);

    match limiter.check(&client_ip).await {
        RateDecision::Allowed => next.run(request).await,
        RateDecision::Limited { retry_after_secs } => {
            metrics::record_rate_limited();
            warn!(client_ip = %client_ip, retry_after_secs, "Rate limit exceeded");
            AppError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

/// Resolve the client IP: the first X-Forwarded-For hop when present
/// (the gateway normally sits behind a proxy), otherwise the peer address.
fn client_ip(request: &Request, addr: SocketAddr) -> String {
    request
        .headers()
        .get(header::HeaderName::from_static("x-forwarded-for"))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_header(name: &str, value: &str) -> Request {
        axum::http::Request::builder()
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    fn peer() -> SocketAddr {
        "10.0.0.1:55555".parse().unwrap()
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let request = request_with_header("x-forwarded-for", "203.0.113.9, 10.0.0.2");
        assert_eq!(client_ip(&request, peer()), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let request = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request, peer()), "10.0.0.1");
    }

    #[test]
    fn test_empty_forwarded_header_falls_back() {
        let request = request_with_header("x-forwarded-for", "  ");
        assert_eq!(client_ip(&request, peer()), "10.0.0.1");
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_everything() {
        let limiter = RateLimiter {
            connection: None,
            points: 1,
            duration_secs: 60,
            enabled: false,
        };

        for _ in 0..10 {
            assert_eq!(limiter.check("198.51.100.1").await, RateDecision::Allowed);
        }
    }

    #[tokio::test]
    async fn test_degraded_limiter_fails_open() {
        // Enabled but with no backing store: every request passes
        let limiter = RateLimiter {
            connection: None,
            points: 1,
            duration_secs: 60,
            enabled: true,
        };

        assert_eq!(limiter.check("198.51.100.1").await, RateDecision::Allowed);
    }
}
