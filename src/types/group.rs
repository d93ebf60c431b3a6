//! Broadcast group keys
//!
//! Every group name in the hub is built here. Call sites never format
//! `user_`/`role_` strings themselves, so case folding cannot drift between
//! registration and broadcast.

use std::fmt;

use serde::Serialize;

/// Prefix of per-user groups
pub const USER_GROUP_PREFIX: &str = "user_";

/// Prefix of per-role groups
pub const ROLE_GROUP_PREFIX: &str = "role_";

/// Which canonical family a group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupFamily {
    User,
    Role,
}

/// Normalized name of a broadcast group.
///
/// Only [`GroupKey::user`] and [`GroupKey::role`] build one; there is no
/// parsing from arbitrary strings.
///
/// ```compile_fail
/// let key: jobs_hub::types::GroupKey = serde_json::from_str("\"USER_ABC\"").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    /// Group for a single user: `user_<lowercased id>`.
    ///
    /// Returns `None` for an empty id.
    pub fn user(user_id: &str) -> Option<Self> {
        Self::build(USER_GROUP_PREFIX, user_id)
    }

    /// Group for every user holding a role: `role_<lowercased role>`.
    ///
    /// Returns `None` for an empty role.
    pub fn role(role: &str) -> Option<Self> {
        Self::build(ROLE_GROUP_PREFIX, role)
    }

    fn build(prefix: &str, raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        Some(Self(format!("{}{}", prefix, raw.to_lowercase())))
    }

    pub fn family(&self) -> GroupFamily {
        if self.0.starts_with(USER_GROUP_PREFIX) {
            GroupFamily::User
        } else {
            GroupFamily::Role
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GroupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_group_is_lowercased() {
        let key = GroupKey::user("ABC-123").unwrap();
        assert_eq!(key.as_str(), "user_abc-123");
        assert_eq!(key.family(), GroupFamily::User);
    }

    #[test]
    fn test_role_group_is_lowercased() {
        let key = GroupKey::role("Admin").unwrap();
        assert_eq!(key.as_str(), "role_admin");
        assert_eq!(key.family(), GroupFamily::Role);
    }

    #[test]
    fn test_empty_input_yields_no_group() {
        assert!(GroupKey::user("").is_none());
        assert!(GroupKey::role("").is_none());
    }

    #[test]
    fn test_differently_cased_ids_share_a_group() {
        assert_eq!(GroupKey::user("Bob"), GroupKey::user("bOB"));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let key = GroupKey::role("Employer").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"role_employer\"");
    }
}
