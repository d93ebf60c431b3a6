//! Client-side event subscriptions
//!
//! Handlers are registered per normalized event name. A [`Subscription`]
//! guard removes its handler when dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::protocol::{normalize_event_name, HubEvent};

type Handler = Arc<dyn Fn(&HubEvent) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    by_event: Mutex<HashMap<String, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
}

impl Handlers {
    fn remove(&self, event: &str, id: u64) {
        let mut by_event = self.by_event.lock();
        if let Some(handlers) = by_event.get_mut(event) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.is_empty() {
                by_event.remove(event);
            }
        }
    }
}

/// Routes pushed events to subscribed handlers
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Arc<Handlers>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event` (name is normalized)
    pub fn subscribe<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        let event = normalize_event_name(event);
        let id = self.handlers.next_id.fetch_add(1, Ordering::SeqCst);
        let handler: Handler = Arc::new(handler);

        self.handlers
            .by_event
            .lock()
            .entry(event.clone())
            .or_default()
            .push((id, handler));

        Subscription {
            handlers: Arc::downgrade(&self.handlers),
            event,
            id,
        }
    }

    /// Deliver an event to its handlers. Returns how many were called.
    ///
    /// Handlers run outside the lock, so they may subscribe or unsubscribe.
    pub fn dispatch(&self, event: &HubEvent) -> usize {
        let name = normalize_event_name(&event.event);
        let handlers: Vec<Handler> = match self.handlers.by_event.lock().get(&name) {
            Some(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .by_event
            .lock()
            .get(&normalize_event_name(event))
            .map_or(0, Vec::len)
    }
}

/// Live handler registration; dropping it unsubscribes
pub struct Subscription {
    handlers: Weak<Handlers>,
    event: String,
    id: u64,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.remove(&self.event, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    fn counting(dispatcher: &EventDispatcher, event: &str) -> (Arc<AtomicU32>, Subscription) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let sub = dispatcher.subscribe(event, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (calls, sub)
    }

    #[test]
    fn test_dispatch_matches_normalized_names() {
        let dispatcher = EventDispatcher::new();
        let (calls, sub) = counting(&dispatcher, " UserBanned");
        assert_eq!(sub.event(), "userbanned");

        let delivered = dispatcher.dispatch(&HubEvent::new("userbanned", json!("x"), 0));
        assert_eq!(delivered, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unrelated_event_not_delivered() {
        let dispatcher = EventDispatcher::new();
        let (calls, _sub) = counting(&dispatcher, "userbanned");

        assert_eq!(dispatcher.dispatch(&HubEvent::new("receivenewjob", json!({}), 0)), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let dispatcher = EventDispatcher::new();
        let (calls, sub) = counting(&dispatcher, "userbanned");
        let (_other_calls, _other) = counting(&dispatcher, "userbanned");
        assert_eq!(dispatcher.handler_count("userbanned"), 2);

        sub.unsubscribe();
        assert_eq!(dispatcher.handler_count("userbanned"), 1);

        dispatcher.dispatch(&HubEvent::new("userbanned", json!("x"), 0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_outlives_dispatcher() {
        let dispatcher = EventDispatcher::new();
        let (_calls, sub) = counting(&dispatcher, "userbanned");
        drop(dispatcher);
        drop(sub);
    }
}
