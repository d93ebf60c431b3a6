//! Local session invalidation

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::types::Identity;

/// Where unauthenticated clients are sent
pub const LOGIN_ROUTE: &str = "/login";

/// Terminates the client's local session.
///
/// Implementations must be idempotent: a second call has no additional
/// observable effect.
pub trait SessionInvalidator: Send + Sync {
    fn invalidate(&self);
}

/// What the client is currently showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Authenticated,
    Unauthenticated { redirect: String },
}

#[derive(Debug)]
struct SessionState {
    token: Option<String>,
    identity: Option<Identity>,
    view: View,
    redirects: u32,
}

/// In-memory client session: token, identity and current view
#[derive(Debug)]
pub struct LocalSession {
    state: Mutex<SessionState>,
}

impl LocalSession {
    /// A logged-in session
    pub fn authenticated(token: impl Into<String>, identity: Identity) -> Self {
        Self {
            state: Mutex::new(SessionState {
                token: Some(token.into()),
                identity: Some(identity),
                view: View::Authenticated,
                redirects: 0,
            }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.state.lock().token.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.lock().identity.clone()
    }

    pub fn view(&self) -> View {
        self.state.lock().view.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().view == View::Authenticated
    }

    /// Number of redirects to the login view performed so far
    pub fn redirect_count(&self) -> u32 {
        self.state.lock().redirects
    }
}

impl SessionInvalidator for LocalSession {
    fn invalidate(&self) {
        let mut state = self.state.lock();
        if state.view != View::Authenticated {
            debug!("session already invalidated");
            return;
        }

        let user_id = state.identity.take().and_then(|i| i.user_id);
        state.token = None;
        state.view = View::Unauthenticated {
            redirect: LOGIN_ROUTE.to_string(),
        };
        state.redirects += 1;

        info!(user_id = user_id.as_deref().unwrap_or(""), "session invalidated");
    }
}
