//! Wires the ban state machine into an event dispatcher

use std::sync::Arc;

use super::ban::BanNotificationStateMachine;
use super::dispatcher::{EventDispatcher, Subscription};
use crate::protocol::{USER_ACTIVATED, USER_BANNED};

/// Keeps a [`BanNotificationStateMachine`] subscribed to account status events.
///
/// Detaching (or dropping) unsubscribes and tears the machine down, so no
/// pending countdown can invalidate the session afterwards.
pub struct BanListener {
    machine: Arc<BanNotificationStateMachine>,
    subscriptions: Vec<Subscription>,
}

impl BanListener {
    pub fn attach(dispatcher: &EventDispatcher, machine: Arc<BanNotificationStateMachine>) -> Self {
        let subscriptions = [USER_BANNED, USER_ACTIVATED]
            .into_iter()
            .map(|event| {
                let machine = machine.clone();
                dispatcher.subscribe(event, move |e| machine.handle_event(e))
            })
            .collect();

        Self {
            machine,
            subscriptions,
        }
    }

    pub fn machine(&self) -> &Arc<BanNotificationStateMachine> {
        &self.machine
    }

    pub fn detach(self) {
        drop(self);
    }
}

impl Drop for BanListener {
    fn drop(&mut self) {
        self.subscriptions.clear();
        self.machine.teardown();
    }
}
