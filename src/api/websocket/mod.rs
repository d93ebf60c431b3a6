//! WebSocket endpoint of the hub
//!
//! Clients connect to `/hub`. On upgrade the connection is registered in the
//! groups derived from its identity; on close it is removed from all of them.
//!
//! ## Features
//! - Targeted delivery of named events (`userbanned`, `useractivated`, ...)
//! - Client-triggered `join_user_group` / `leave_user_group`
//! - Sequence ID tracking for gap detection

pub mod handler;
pub mod state;

pub use handler::ws_handler;
pub use state::AppState;
