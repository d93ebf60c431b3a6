//! Admin notification endpoints
//!
//! - `POST /api/admin/users/:user_id/status` - push `userbanned` / `useractivated`
//! - `POST /api/admin/notify` - push any named event to a user, a role or everyone
//!
//! Both require a bearer token whose role matches `HUB_ADMIN_ROLE`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::websocket::AppState;
use crate::auth::ConnectCredentials;
use crate::error::{HubError, HubResult};
use crate::protocol::{normalize_event_name, USER_ACTIVATED, USER_BANNED};
use crate::types::Identity;

/// Body of the account status endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub is_active: bool,
    /// Overrides the configured default message
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub user_id: String,
    pub is_active: bool,
    pub event: String,
}

/// Who receives a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyTarget {
    User(String),
    Role(String),
    All,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub target: NotifyTarget,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> HubResult<Identity> {
    let credentials = ConnectCredentials::from_request(headers, None);
    if credentials.token.is_none() {
        return Err(HubError::Unauthorized);
    }

    let identity = state
        .identity
        .lookup(&credentials)
        .ok_or(HubError::Unauthorized)?;

    match identity.role.as_deref() {
        Some(role) if state.config.is_admin_role(role) => Ok(identity),
        _ => Err(HubError::Forbidden),
    }
}

/// POST /api/admin/users/:user_id/status
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> HubResult<Json<StatusResponse>> {
    let admin = require_admin(&state, &headers)?;

    let (event, default_message) = if request.is_active {
        (USER_ACTIVATED, &state.config.activated_message)
    } else {
        (USER_BANNED, &state.config.ban_message)
    };
    let message = request
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| default_message.clone());

    state
        .broadcaster
        .send_to_user(&user_id, event, Value::String(message));

    info!(
        admin = admin.user_id.as_deref().unwrap_or(""),
        user_id = %user_id,
        event,
        "account status notification sent"
    );

    Ok(Json(StatusResponse {
        user_id,
        is_active: request.is_active,
        event: event.to_string(),
    }))
}

/// POST /api/admin/notify
pub async fn notify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<NotifyRequest>,
) -> HubResult<(StatusCode, Json<Value>)> {
    require_admin(&state, &headers)?;

    let event = normalize_event_name(&request.event);
    if event.is_empty() {
        return Err(HubError::invalid_request("event name must not be empty"));
    }

    match &request.target {
        NotifyTarget::User(user_id) => {
            state
                .broadcaster
                .send_to_user(user_id, &event, request.payload)
        }
        NotifyTarget::Role(role) => state.broadcaster.send_to_role(role, &event, request.payload),
        NotifyTarget::All => state.broadcaster.send_to_all(&event, request.payload),
    }

    info!(event = %event, target = ?request.target, "notification sent");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "event": event, "target": request.target })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::hub::outbox;
    use crate::types::ConnectionId;

    fn state_with(identity: Option<Identity>) -> AppState {
        let config = HubConfig::new("test-secret-key-that-is-at-least-32-characters-long").unwrap();
        AppState::with_identity_lookup(
            config,
            Arc::new(move |_: &ConnectCredentials| identity.clone()),
        )
    }

    fn bearer() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer t".parse().unwrap());
        headers
    }

    #[test]
    fn test_require_admin() {
        let state = state_with(Some(Identity::new("root", "Admin")));
        assert!(require_admin(&state, &bearer()).is_ok());
        assert!(matches!(
            require_admin(&state, &HeaderMap::new()),
            Err(HubError::Unauthorized)
        ));

        let state = state_with(Some(Identity::new("bob", "Candidate")));
        assert!(matches!(require_admin(&state, &bearer()), Err(HubError::Forbidden)));

        let state = state_with(None);
        assert!(matches!(require_admin(&state, &bearer()), Err(HubError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_ban_uses_default_message() {
        let state = Arc::new(state_with(Some(Identity::new("root", "admin"))));
        let (tx, mut rx) = outbox();
        state
            .registry
            .on_connect(&ConnectionId::from("c1"), &Identity::user("ABC"), tx);

        let Json(response) = update_user_status(
            State(state.clone()),
            bearer(),
            Path("abc".to_string()),
            Json(StatusRequest {
                is_active: false,
                message: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.event, USER_BANNED);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, USER_BANNED);
        assert_eq!(event.payload, Value::String(state.config.ban_message.clone()));
    }

    #[tokio::test]
    async fn test_notify_rejects_empty_event() {
        let state = Arc::new(state_with(Some(Identity::new("root", "admin"))));
        let result = notify(
            State(state),
            bearer(),
            Json(NotifyRequest {
                target: NotifyTarget::All,
                event: "   ".to_string(),
                payload: Value::Null,
            }),
        )
        .await;

        assert!(matches!(result, Err(HubError::InvalidRequest { .. })));
    }

    #[test]
    fn test_notify_target_parsing() {
        let target: NotifyTarget = serde_json::from_str(r#"{"role":"Employer"}"#).unwrap();
        assert!(matches!(target, NotifyTarget::Role(r) if r == "Employer"));

        let target: NotifyTarget = serde_json::from_str(r#""all""#).unwrap();
        assert!(matches!(target, NotifyTarget::All));
    }
}
