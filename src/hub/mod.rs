//! Server side of the realtime hub
//!
//! - `registry`: which live connections belong to which groups
//! - `broadcaster`: fire-and-forget delivery of named events to a group

pub mod broadcaster;
pub mod registry;

pub use broadcaster::GroupBroadcaster;
pub use registry::{
    bounded_outbox, outbox, ConnectionRegistry, Delivery, Inbox, JoinOutcome, Outbox,
    DEFAULT_OUTBOX_CAPACITY,
};
