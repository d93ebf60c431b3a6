//! HTTP server setup with Axum

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::admin;
use super::websocket::{ws_handler, AppState};
use crate::error::HubResult;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket endpoint
        .route("/hub", get(ws_handler))
        // Health check
        .route("/health", get(health_check))
        .route("/api/hub/stats", get(hub_stats))
        // Admin notifications
        .route(
            "/api/admin/users/:user_id/status",
            post(admin::update_user_status),
        )
        .route("/api/admin/notify", post(admin::notify))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the hub until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> HubResult<()> {
    info!(addr = ?listener.local_addr().ok(), "hub listening");
    let registry = state.registry.clone();
    let shutdown = async move {
        shutdown.await;
        // Upgraded sockets outlive the HTTP connections; close them too
        let closed = registry.disconnect_all();
        info!(connections = closed, "closing hub connections");
    };

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/hub/stats
async fn hub_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "connections": state.registry.connection_count(),
        "groups": state.registry.group_count(),
        "sequence_id": state.broadcaster.current_sequence_id(),
    }))
}
