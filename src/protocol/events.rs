//! Named push events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Account was locked; payload is a human-readable reason
pub const USER_BANNED: &str = "userbanned";

/// Account was unlocked; payload is a human-readable message
pub const USER_ACTIVATED: &str = "useractivated";

/// A new job was posted (sent to everyone)
pub const RECEIVE_NEW_JOB: &str = "receivenewjob";

/// A candidate's application status changed
pub const RECEIVE_STATUS_UPDATE: &str = "receivestatusupdate";

/// An employer received a new application
pub const RECEIVE_APPLICATION_NOTIFICATION: &str = "receiveapplicationnotification";

/// Canonical form of an event name: trimmed and lowercased
pub fn normalize_event_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One event fanned out to the connections of a group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    /// Normalized event name
    pub event: String,

    pub payload: Value,

    /// Monotonically increasing sequence ID across all broadcasts
    pub sequence_id: u64,

    /// Unix timestamp when the event was created
    pub timestamp: i64,
}

impl HubEvent {
    pub fn new(event: &str, payload: Value, sequence_id: u64) -> Self {
        Self {
            event: normalize_event_name(event),
            payload,
            sequence_id,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Payload rendered as display text: strings verbatim, anything else as JSON
    pub fn payload_text(&self) -> String {
        payload_text(&self.payload)
    }
}

pub(crate) fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
