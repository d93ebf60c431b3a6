//! Shared application state for the hub endpoints

use std::sync::Arc;

use crate::auth::{JwtIdentityLookup, SharedIdentityLookup};
use crate::config::HubConfig;
use crate::hub::{ConnectionRegistry, GroupBroadcaster};

/// Shared application state for WebSocket and REST handlers
pub struct AppState {
    /// Live connections and their groups
    pub registry: Arc<ConnectionRegistry>,

    /// Group fan-out over the same registry
    pub broadcaster: Arc<GroupBroadcaster>,

    /// Resolves connect-time identity
    pub identity: SharedIdentityLookup,

    pub config: Arc<HubConfig>,
}

impl AppState {
    /// State verifying tokens with the configured JWT secret
    pub fn new(config: HubConfig) -> Self {
        let lookup = Arc::new(JwtIdentityLookup::new(&config.jwt_secret));
        Self::with_identity_lookup(config, lookup)
    }

    pub fn with_identity_lookup(config: HubConfig, identity: SharedIdentityLookup) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(GroupBroadcaster::new(registry.clone()));

        Self {
            registry,
            broadcaster,
            identity,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::outbox;
    use crate::types::{ConnectionId, Identity};
    use serde_json::json;

    const SECRET: &str = "test-secret-key-that-is-at-least-32-characters-long";

    #[tokio::test]
    async fn test_broadcaster_shares_registry() {
        let state = AppState::new(HubConfig::new(SECRET).unwrap());
        let (tx, mut rx) = outbox();
        state
            .registry
            .on_connect(&ConnectionId::from("c1"), &Identity::user("abc"), tx);

        state.broadcaster.send_to_user("abc", "userbanned", json!("x"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "userbanned");
    }
}
