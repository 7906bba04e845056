//! Health check endpoint for the worker daemon

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Worker state shared across handlers
#[derive(Clone)]
pub struct WorkerState {
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl WorkerState {
    pub fn new() -> Self {
        Self {
            startup_time: Utc::now(),
        }
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (e.g., "ok")
    pub status: String,
    /// Module name ("viva-worker")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health_check(State(state): State<WorkerState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "viva-worker".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
    })
}

/// Build worker router
pub fn build_router(state: WorkerState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}
