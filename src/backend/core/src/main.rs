//! Amprov Server - Main entry point
//!
//! Serves the provenance ledger over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use amprov_core::{
    api::{self, AppState},
    config::Config,
    gateway::{LocalGateway, ProvenanceGateway},
    ledger::{AssetLedger, ContextFactory},
    store, telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match std::env::var("AMPROV_CONFIG") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default()
        }),
    };

    let telemetry = telemetry::init_telemetry(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        store = ?config.store.backend,
        stage_policy = ?config.ledger.stage_policy,
        "Starting Amprov Server"
    );

    let state_store = store::connect(&config.store).await?;
    tracing::info!(backend = state_store.name(), "State store connected");

    let ledger = AssetLedger::new(state_store, config.ledger.stage_policy);
    let gateway: Arc<dyn ProvenanceGateway> = Arc::new(LocalGateway::new(
        ledger,
        ContextFactory::from_config(&config.ledger),
    ));

    let state = AppState::new(gateway, telemetry.metrics);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    api::serve(addr, state, shutdown_signal()).await?;
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
