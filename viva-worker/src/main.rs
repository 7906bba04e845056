//! viva-worker - AI Generation Worker
//!
//! Consumes job messages from the backend, calls the language-model API to
//! generate viva questions or rubrics, and publishes results back over the
//! results queue. Runs as a long-lived daemon that survives broker
//! restarts.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use viva_worker::api::{build_router, WorkerState};
use viva_worker::config::WorkerConfig;
use viva_worker::consumer;
use viva_worker::generator::{Generator, LlmClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting viva-worker (AI generation) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::load()?;

    if config.llm.api_key.trim().is_empty() {
        warn!("No LLM API key configured (VIVA_LLM_API_KEY); generation calls will fail");
    }

    let generator: Arc<dyn Generator> = Arc::new(
        LlmClient::new(config.llm.clone())
            .map_err(|e| anyhow::anyhow!("Failed to create LLM client: {}", e))?,
    );

    // Job consume loop runs for the life of the process and owns its own
    // reconnect lifecycle.
    tokio::spawn(consumer::run(generator, config.clone()));

    // Health surface
    let state = WorkerState::new();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
