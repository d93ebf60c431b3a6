//! WebSocket connection handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use tracing::{debug, warn};

use super::state::AppState;
use crate::auth::ConnectCredentials;
use crate::hub::bounded_outbox;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::types::{ConnectionId, Identity};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Bearer token for clients that cannot set headers
    pub access_token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let credentials = ConnectCredentials::from_request(&headers, params.access_token.as_deref());
    let identity = state.identity.lookup(&credentials).unwrap_or_default();

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, identity: Identity) {
    let connection_id = ConnectionId::generate();
    let (tx, mut rx) = bounded_outbox(state.config.outbox_capacity);
    let groups = state.registry.on_connect(&connection_id, &identity, tx);

    let welcome = ServerFrame::Connected {
        connection_id: connection_id.to_string(),
        groups: groups.iter().map(|g| g.to_string()).collect(),
    };

    if send_frame(&mut socket, &welcome).await {
        loop {
            tokio::select! {
                // Events fanned out to this connection's groups
                event = rx.recv() => {
                    let Some(event) = event else {
                        // Unregistered by the hub (shutdown)
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    };

                    let missed = rx.take_lagged();
                    if missed > 0 {
                        warn!(connection_id = %connection_id, missed, "client lagging behind");
                        let lagged = ServerFrame::error("lagged", format!("Missed {} events", missed));
                        if !send_frame(&mut socket, &lagged).await {
                            break;
                        }
                    }

                    if !send_frame(&mut socket, &ServerFrame::from(event.as_ref())).await {
                        break; // Client disconnected
                    }
                }

                // Handle client messages
                result = socket.recv() => {
                    match result {
                        Some(Ok(msg)) => {
                            if !handle_client_message(msg, &mut socket, &state, &connection_id).await {
                                break; // Client requested close or error
                            }
                        }
                        Some(Err(e)) => {
                            debug!(connection_id = %connection_id, error = %e, "websocket error");
                            break;
                        }
                        None => break, // Client disconnected
                    }
                }
            }
        }
    }

    state.registry.on_disconnect(&connection_id);
}

/// Serialize and send one frame. Returns false once the socket is unusable.
async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "failed to serialize frame");
            true
        }
    }
}

/// Handle a message from the client
/// Returns false if the connection should be closed
async fn handle_client_message(
    msg: Message,
    socket: &mut WebSocket,
    state: &AppState,
    connection_id: &ConnectionId,
) -> bool {
    match msg {
        Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
            Ok(ClientFrame::JoinUserGroup { user_id }) => {
                state.registry.join_user_group(connection_id, &user_id);
                true
            }
            Ok(ClientFrame::LeaveUserGroup { user_id }) => {
                state.registry.leave_user_group(connection_id, &user_id);
                true
            }
            Ok(ClientFrame::Ping) => send_frame(socket, &ServerFrame::Pong).await,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "unparseable client frame");
                send_frame(socket, &ServerFrame::error("bad_frame", e.to_string())).await
            }
        },
        Message::Binary(_) => true, // Ignore binary messages
        Message::Ping(data) => socket.send(Message::Pong(data)).await.is_ok(),
        Message::Pong(_) => true, // Ignore pong responses
        Message::Close(_) => false, // Client requested close
    }
}
