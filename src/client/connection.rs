//! WebSocket client for the hub
//!
//! One supervisor task owns the socket. It hands `event` frames to an
//! [`EventDispatcher`], writes queued client frames and, when the socket
//! drops, reconnects with backoff under the same dispatcher. User groups
//! joined through this connection are joined again after each reconnect.
//! Group calls are fire-and-forget.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::dispatcher::EventDispatcher;
use super::reconnect::{ConnectionState, ReconnectPolicy};
use crate::error::{ClientError, ClientResult};
use crate::protocol::{ClientFrame, ServerFrame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Frame(ClientFrame),
    Close,
}

enum SessionEnd {
    Stopped,
    Dropped,
}

/// What the hub said in its `connected` frame
#[derive(Debug, Clone)]
struct Welcome {
    connection_id: String,
    groups: Vec<String>,
}

struct Endpoint {
    url: String,
    token: Option<String>,
}

impl Endpoint {
    fn request(&self) -> ClientResult<Request> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                ClientError::Handshake {
                    message: e.to_string(),
                }
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }
}

struct Shared {
    welcome: Mutex<Welcome>,
    /// Lowercased user ids joined since connecting
    joined: Mutex<BTreeSet<String>>,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn joined_users(&self) -> Vec<String> {
        self.joined.lock().iter().cloned().collect()
    }
}

/// A live connection to the hub
pub struct HubConnection {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    supervisor: JoinHandle<()>,
}

impl HubConnection {
    /// Connect to `url` (e.g. `ws://localhost:5000/hub`) with the default
    /// reconnect policy and wait for the welcome frame
    pub async fn connect(
        url: &str,
        token: Option<&str>,
        dispatcher: EventDispatcher,
    ) -> ClientResult<Self> {
        Self::connect_with(url, token, dispatcher, ReconnectPolicy::default()).await
    }

    /// Like [`HubConnection::connect`] with an explicit reconnect policy.
    ///
    /// The first connect is not retried; its error is returned.
    pub async fn connect_with(
        url: &str,
        token: Option<&str>,
        dispatcher: EventDispatcher,
        policy: ReconnectPolicy,
    ) -> ClientResult<Self> {
        let endpoint = Endpoint {
            url: url.to_string(),
            token: token.map(str::to_string),
        };
        let (socket, welcome) = handshake(&endpoint).await?;
        info!(connection_id = %welcome.connection_id, groups = ?welcome.groups, "connected to hub");

        let (state, _) = watch::channel(ConnectionState::Connected);
        let shared = Arc::new(Shared {
            welcome: Mutex::new(welcome),
            joined: Mutex::new(BTreeSet::new()),
            state,
        });
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let supervisor = tokio::spawn(supervise(
            shared.clone(),
            endpoint,
            policy,
            dispatcher,
            socket,
            commands_rx,
        ));

        Ok(Self {
            shared,
            commands,
            supervisor,
        })
    }

    /// Id the hub assigned to the current socket; changes on reconnect
    pub fn connection_id(&self) -> String {
        self.shared.welcome.lock().connection_id.clone()
    }

    /// Groups the hub reported for the current socket
    pub fn groups(&self) -> Vec<String> {
        self.shared.welcome.lock().groups.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch connection state transitions
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Ask the hub to add this connection to a user's group; no-op on an empty id.
    ///
    /// The join is repeated after every reconnect until left.
    pub fn join_user_group(&self, user_id: &str) {
        if user_id.is_empty() {
            return;
        }
        self.shared.joined.lock().insert(user_id.to_lowercase());
        self.send(ClientFrame::JoinUserGroup {
            user_id: user_id.to_string(),
        });
    }

    /// Ask the hub to remove this connection from a user's group; no-op on an empty id
    pub fn leave_user_group(&self, user_id: &str) {
        if user_id.is_empty() {
            return;
        }
        self.shared.joined.lock().remove(&user_id.to_lowercase());
        self.send(ClientFrame::LeaveUserGroup {
            user_id: user_id.to_string(),
        });
    }

    pub fn ping(&self) {
        self.send(ClientFrame::Ping);
    }

    fn send(&self, frame: ClientFrame) {
        if !self.is_connected() {
            debug!(?frame, state = %self.state(), "dropping frame while not connected");
            return;
        }
        let _ = self.commands.send(Command::Frame(frame));
    }

    /// Close the socket and stop reconnecting
    pub async fn stop(self) {
        let _ = self.commands.send(Command::Close);
        let _ = self.supervisor.await;
        self.shared.set_state(ConnectionState::Disconnected);
        debug!("hub connection stopped");
    }
}

/// Open a socket and wait for the hub's `connected` frame
async fn handshake(endpoint: &Endpoint) -> ClientResult<(Socket, Welcome)> {
    let (mut socket, _) = connect_async(endpoint.request()?).await?;

    loop {
        let text = match socket.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(_)) => {
                return Err(ClientError::Handshake {
                    message: "unexpected message before welcome".to_string(),
                })
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ClientError::Closed),
        };

        return match serde_json::from_str::<ServerFrame>(&text) {
            Ok(ServerFrame::Connected {
                connection_id,
                groups,
            }) => Ok((
                socket,
                Welcome {
                    connection_id,
                    groups,
                },
            )),
            Ok(other) => Err(ClientError::Handshake {
                message: format!("unexpected frame before welcome: {:?}", other),
            }),
            Err(e) => Err(ClientError::Handshake {
                message: e.to_string(),
            }),
        };
    }
}

async fn supervise(
    shared: Arc<Shared>,
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    dispatcher: EventDispatcher,
    mut socket: Socket,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    loop {
        if let SessionEnd::Stopped = pump(&mut socket, &mut commands, &dispatcher).await {
            break;
        }
        warn!("hub connection lost");

        match reconnect(&shared, &endpoint, &policy, &mut commands).await {
            Some(next) => socket = next,
            None => break,
        }
    }

    shared.set_state(ConnectionState::Disconnected);
    debug!("hub connection closed");
}

/// Move frames both ways until the socket drops or a stop is requested
async fn pump(
    socket: &mut Socket,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    dispatcher: &EventDispatcher,
) -> SessionEnd {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Frame(frame)) => match serde_json::to_string(&frame) {
                    Ok(json) => {
                        if socket.send(Message::Text(json)).await.is_err() {
                            return SessionEnd::Dropped;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize client frame"),
                },
                // Close requested, or the handle was dropped
                Some(Command::Close) | None => {
                    let _ = socket.close(None).await;
                    return SessionEnd::Stopped;
                }
            },

            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => handle_text(&text, dispatcher),
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "hub connection error");
                    return SessionEnd::Dropped;
                }
            },
        }
    }
}

fn handle_text(text: &str, dispatcher: &EventDispatcher) {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::Error { code, message }) => {
            warn!(code = %code, message = %message, "hub reported an error")
        }
        Ok(frame) => {
            if let Some(event) = frame.into_event() {
                dispatcher.dispatch(&event);
            }
        }
        Err(e) => warn!(error = %e, "unparseable server frame"),
    }
}

/// Retry until a socket is back (with groups rejoined) or the policy gives up.
///
/// Returns `None` on give-up or when a stop arrives while waiting.
async fn reconnect(
    shared: &Shared,
    endpoint: &Endpoint,
    policy: &ReconnectPolicy,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Option<Socket> {
    let mut attempt = 0;

    loop {
        attempt += 1;
        if !policy.allows(attempt) {
            warn!(attempts = attempt - 1, "giving up on hub connection");
            return None;
        }
        shared.set_state(ConnectionState::Reconnecting { attempt });

        let delay = sleep(policy.delay_for(attempt));
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                command = commands.recv() => match command {
                    Some(Command::Frame(frame)) => debug!(?frame, "dropping frame while reconnecting"),
                    Some(Command::Close) | None => return None,
                },
            }
        }

        let (mut socket, welcome) = match handshake(endpoint).await {
            Ok(connected) => connected,
            Err(e) => {
                debug!(attempt, error = %e, "reconnect attempt failed");
                continue;
            }
        };

        if let Err(e) = rejoin(&mut socket, &shared.joined_users()).await {
            debug!(attempt, error = %e, "rejoining user groups failed");
            continue;
        }

        info!(
            attempt,
            connection_id = %welcome.connection_id,
            groups = ?welcome.groups,
            "reconnected to hub"
        );
        *shared.welcome.lock() = welcome;
        shared.set_state(ConnectionState::Connected);
        return Some(socket);
    }
}

async fn rejoin(socket: &mut Socket, users: &[String]) -> ClientResult<()> {
    for user_id in users {
        let frame = ClientFrame::JoinUserGroup {
            user_id: user_id.clone(),
        };
        let json = serde_json::to_string(&frame).map_err(|e| ClientError::Handshake {
            message: e.to_string(),
        })?;
        socket.send(Message::Text(json)).await?;
    }
    Ok(())
}
