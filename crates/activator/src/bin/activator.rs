//! Activation gateway binary.
//!
//! Standalone HTTP service managing on-demand service instances in one
//! cluster.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use activator::{server, AppState, Config, PlatformBackend, TemplateEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("activator=info".parse()?))
        .init();

    info!("Starting activation gateway...");

    // Load configuration
    let config = Config::default();
    info!(
        cluster = %config.cluster,
        region = %config.region,
        orchestrator = %config.orchestrator_url,
        "Configuration loaded"
    );

    let backend = PlatformBackend::new(&config).context("Failed to create platform backend")?;
    let templates = TemplateEngine::new().context("Failed to load templates")?;

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(config, Arc::new(backend), templates));

    server::run_server(state, &addr).await
}
