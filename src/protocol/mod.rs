//! Hub protocol types
//!
//! Named events and the JSON frames that carry them over the WebSocket.

mod events;
mod frames;

pub use events::{
    normalize_event_name, HubEvent, RECEIVE_APPLICATION_NOTIFICATION, RECEIVE_NEW_JOB,
    RECEIVE_STATUS_UPDATE, USER_ACTIVATED, USER_BANNED,
};
pub(crate) use events::payload_text;
pub use frames::{ClientFrame, ServerFrame};
