//! API module for HTTP and WebSocket endpoints
//!
//! This module exposes the hub's WebSocket endpoint plus health, stats and
//! admin notification routes.

pub mod admin;
pub mod http;
pub mod websocket;

pub use http::{create_router, serve};
pub use websocket::AppState;
