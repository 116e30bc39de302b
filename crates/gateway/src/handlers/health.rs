//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub search: CheckResult,
    pub cache: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn up(started: std::time::Instant) -> Self {
        Self {
            status: "up".to_string(),
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        }
    }

    fn down(error: String) -> Self {
        Self {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(error),
        }
    }

    fn disabled() -> Self {
        Self {
            status: "disabled".to_string(),
            latency_ms: None,
            error: None,
        }
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - checks all dependencies
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let started = std::time::Instant::now();
    let database = match state.db.ping().await {
        Ok(_) => CheckResult::up(started),
        Err(e) => CheckResult::down(e.to_string()),
    };

    let started = std::time::Instant::now();
    let search = match state.search.ping().await {
        Ok(_) => CheckResult::up(started),
        Err(e) => CheckResult::down(e.to_string()),
    };

    // The cache is best-effort: it reports its state but never blocks
    // readiness
    let cache = match state.cache {
        Some(ref cache) => {
            let started = std::time::Instant::now();
            match cache.ping().await {
                Ok(_) => CheckResult::up(started),
                Err(e) => CheckResult::down(e.to_string()),
            }
        }
        None => CheckResult::disabled(),
    };

    let all_ready = database.status == "up" && search.status == "up";

    Json(ReadyResponse {
        status: if all_ready { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            database,
            search,
            cache,
        },
    })
}
