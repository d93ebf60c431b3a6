//! WebSocket frame types exchanged between the hub and its clients

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::HubEvent;

/// Frames sent from the hub to a client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once right after the upgrade
    Connected {
        connection_id: String,
        groups: Vec<String>,
    },

    /// A pushed named event
    Event {
        event: String,
        payload: Value,
        sequence_id: u64,
        timestamp: i64,
    },

    /// Heartbeat reply
    Pong,

    /// Protocol error notification; the connection stays open
    Error { code: String, message: String },
}

impl From<&HubEvent> for ServerFrame {
    fn from(event: &HubEvent) -> Self {
        ServerFrame::Event {
            event: event.event.clone(),
            payload: event.payload.clone(),
            sequence_id: event.sequence_id,
            timestamp: event.timestamp,
        }
    }
}

impl ServerFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// The carried event, if this is an event frame
    pub fn into_event(self) -> Option<HubEvent> {
        match self {
            ServerFrame::Event {
                event,
                payload,
                sequence_id,
                timestamp,
            } => Some(HubEvent {
                event,
                payload,
                sequence_id,
                timestamp,
            }),
            _ => None,
        }
    }
}

/// Frames a client may send to the hub
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Join the personal group of a user
    JoinUserGroup {
        #[serde(default)]
        user_id: String,
    },

    /// Leave the personal group of a user
    LeaveUserGroup {
        #[serde(default)]
        user_id: String,
    },

    /// Ping for heartbeat
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_frame_serialization() {
        let event = HubEvent {
            event: "userbanned".to_string(),
            payload: json!("You violated ToS"),
            sequence_id: 42,
            timestamp: 1234567890,
        };

        let json = serde_json::to_value(ServerFrame::from(&event)).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"], "userbanned");
        assert_eq!(json["sequence_id"], 42);
    }

    #[test]
    fn test_client_frame_parsing() {
        let msg: ClientFrame =
            serde_json::from_str(r#"{"type":"join_user_group","user_id":"ABC"}"#).unwrap();
        assert_eq!(
            msg,
            ClientFrame::JoinUserGroup {
                user_id: "ABC".to_string()
            }
        );

        let msg: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientFrame::Ping));
    }

    #[test]
    fn test_missing_user_id_defaults_to_empty() {
        let msg: ClientFrame = serde_json::from_str(r#"{"type":"leave_user_group"}"#).unwrap();
        assert_eq!(
            msg,
            ClientFrame::LeaveUserGroup {
                user_id: String::new()
            }
        );
    }

    #[test]
    fn test_into_event_ignores_other_frames() {
        assert!(ServerFrame::Pong.into_event().is_none());
    }
}
