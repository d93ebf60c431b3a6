//! Connection identifiers and connect-time identity

use std::fmt;

use serde::{Deserialize, Serialize};

use super::GroupKey;

/// Opaque identifier of one live connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh, process-unique connection id
    pub fn generate() -> Self {
        Self(format!("conn_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity established when the connection was authenticated.
///
/// Both parts are optional; an identity with neither is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            role: Some(role.into()),
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            role: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_key().is_none()
    }

    /// The user group this identity belongs to, if any
    pub fn user_key(&self) -> Option<GroupKey> {
        self.user_id.as_deref().and_then(GroupKey::user)
    }

    /// Groups joined at connect time.
    ///
    /// The role group is only derived alongside a user group.
    pub fn groups(&self) -> Vec<GroupKey> {
        let Some(user) = self.user_key() else {
            return Vec::new();
        };

        let mut groups = vec![user];
        if let Some(role) = self.role.as_deref().and_then(GroupKey::role) {
            groups.push(role);
        }
        groups
    }
}
