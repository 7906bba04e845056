//! viva-server library interface
//!
//! Exposes the producer, dispatcher and database layers for integration
//! testing alongside the HTTP surface.

pub mod api;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod producer;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::producer::Producer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Submit-path producer
    pub producer: Arc<Producer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, producer: Arc<Producer>) -> Self {
        Self {
            db,
            producer,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::health_routes())
        .merge(api::pipeline::pipeline_routes())
        .with_state(state)
}
