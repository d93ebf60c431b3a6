//! Client side of the hub: connection, event routing and the ban flow

pub mod ban;
pub mod connection;
pub mod countdown;
pub mod dispatcher;
pub mod invalidator;
pub mod listener;
pub mod reconnect;

pub use ban::{
    ActivationHook, BanNotification, BanNotificationStateMachine, BanState, IgnoreActivation,
    DEFAULT_COUNTDOWN_SECONDS,
};
pub use connection::HubConnection;
pub use countdown::{CountdownTask, MIN_TICK_PERIOD};
pub use dispatcher::{EventDispatcher, Subscription};
pub use invalidator::{LocalSession, SessionInvalidator, View, LOGIN_ROUTE};
pub use listener::BanListener;
pub use reconnect::{ConnectionState, ReconnectPolicy};
