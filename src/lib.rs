//! Jobs Hub
//!
//! Real-time push notifications for a job board. Authenticated clients hold a
//! WebSocket to the hub; the hub files every connection under its user and
//! role groups and broadcasts events (`userbanned`, `receivenewjob`, ...) to
//! those groups.
//!
//! # Modules
//!
//! - `types`: Group keys, identities and connection ids
//! - `protocol`: Hub events and the JSON wire frames
//! - `auth`: Resolving an identity from a bearer token
//! - `hub`: Connection registry and group broadcaster
//! - `api`: Axum router (WebSocket endpoint, admin notifications, stats)
//! - `client`: Hub connection, event dispatcher and the ban/logout flow
//! - `config`: Environment configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jobs_hub::{serve, AppState, HubConfig};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> jobs_hub::HubResult<()> {
//!     let config = HubConfig::from_env()?;
//!     let listener = TcpListener::bind(config.bind_addr).await?;
//!     let state = Arc::new(AppState::new(config));
//!     serve(listener, state, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod types;

// Re-export commonly used items at crate root
pub use api::{create_router, serve, AppState};
pub use client::{
    BanListener, BanNotificationStateMachine, BanState, ConnectionState, EventDispatcher,
    HubConnection, LocalSession, ReconnectPolicy, SessionInvalidator,
};
pub use config::HubConfig;
pub use error::{ClientError, ClientResult, HubError, HubResult};
pub use hub::{ConnectionRegistry, GroupBroadcaster};
pub use protocol::{ClientFrame, HubEvent, ServerFrame};
pub use types::{ConnectionId, GroupKey, Identity};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
