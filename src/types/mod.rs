//! Data types for the realtime hub
//!
//! This module contains the core identifiers shared by the server and client sides.

mod group;
mod identity;

pub use group::{GroupFamily, GroupKey, ROLE_GROUP_PREFIX, USER_GROUP_PREFIX};
pub use identity::{ConnectionId, Identity};
