//! Jobs Hub - Binary Entry Point
//!
//! Starts the push-notification hub on `HUB_BIND_ADDR`.

use std::sync::Arc;

use jobs_hub::api::{serve, AppState};
use jobs_hub::config::HubConfig;
use jobs_hub::error::HubResult;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "jobs_hub=info,tower_http=info";

#[tokio::main]
async fn main() -> HubResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = HubConfig::from_env()?;
    let listener = TcpListener::bind(config.bind_addr).await?;
    let state = Arc::new(AppState::new(config));

    serve(listener, state, shutdown_signal()).await?;

    tracing::info!("hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutting down...");
}
