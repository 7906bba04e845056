//! viva-server - Backend Pipeline Service
//!
//! Owns the producer (submit path) and the result dispatcher of the viva
//! question-generation pipeline, plus a thin HTTP trigger/health surface.
//! The AI worker runs as a separate daemon connected through the broker.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use viva_common::queue::{self, Broker};

use viva_server::config::ServerConfig;
use viva_server::producer::{AmqpJobPublisher, Producer};
use viva_server::{build_router, dispatcher, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting viva-server (backend pipeline) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load()?;

    // Database connection pool
    let db_pool = viva_server::db::init_database_pool(&config.db_path).await?;
    info!("Database: {}", config.db_path.display());

    // Broker connection is established once and shared; the dispatcher task
    // owns its own reconnect lifecycle.
    let broker = Broker::connect_with_retry(&config.broker).await;
    let channel = broker.open_channel().await?;

    // Queue declaration failures (durability mismatch) are fatal here.
    queue::declare_queues(&channel, &config.broker).await?;

    let publisher = AmqpJobPublisher::new(channel, config.broker.jobs_queue.clone());
    let producer = Arc::new(Producer::new(db_pool.clone(), Arc::new(publisher)));

    // Result dispatcher consumes the results queue for the life of the process
    tokio::spawn(dispatcher::run(db_pool.clone(), config.broker.clone()));

    // HTTP surface
    let state = AppState::new(db_pool, producer);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
