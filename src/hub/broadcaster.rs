//! Group event broadcaster
//!
//! Fans a named event out to every connection currently registered in a
//! group. Delivery is fire-and-forget: the member set is read at call time,
//! closed outboxes are skipped, and nothing is queued for connections that
//! are not live. A connection whose outbox is full loses the event; its
//! socket task reports the lag to the client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::registry::{ConnectionRegistry, Delivery, Outbox};
use crate::protocol::HubEvent;
use crate::types::{ConnectionId, GroupKey};

/// Sends named events to groups of live connections
pub struct GroupBroadcaster {
    registry: Arc<ConnectionRegistry>,
    sequence_counter: AtomicU64,
}

impl GroupBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            sequence_counter: AtomicU64::new(0),
        }
    }

    /// Send to every connection of `user_<lower(user_id)>`
    pub fn send_to_user(&self, user_id: &str, event: &str, payload: Value) {
        if let Some(group) = GroupKey::user(user_id) {
            self.send_to_group(&group, event, payload);
        }
    }

    /// Send to every connection of `role_<lower(role)>`
    pub fn send_to_role(&self, role: &str, event: &str, payload: Value) {
        if let Some(group) = GroupKey::role(role) {
            self.send_to_group(&group, event, payload);
        }
    }

    pub fn send_to_group(&self, group: &GroupKey, event: &str, payload: Value) {
        let recipients = self.registry.outboxes_in(group);
        let delivered = self.deliver(recipients, event, payload);
        debug!(group = %group, event, recipients = delivered, "group broadcast");
    }

    /// Send to every live connection, grouped or not
    pub fn send_to_all(&self, event: &str, payload: Value) {
        let recipients = self.registry.all_outboxes();
        let delivered = self.deliver(recipients, event, payload);
        debug!(event, recipients = delivered, "broadcast to all");
    }

    /// Get the current sequence ID
    pub fn current_sequence_id(&self) -> u64 {
        self.sequence_counter.load(Ordering::SeqCst)
    }

    fn deliver(&self, recipients: Vec<(ConnectionId, Outbox)>, event: &str, payload: Value) -> usize {
        let seq = self.sequence_counter.fetch_add(1, Ordering::SeqCst);
        let message = Arc::new(HubEvent::new(event, payload, seq));

        let mut delivered = 0;
        for (connection_id, outbox) in recipients {
            match outbox.push(Arc::clone(&message)) {
                Delivery::Queued => delivered += 1,
                Delivery::Lagged => {
                    warn!(connection_id = %connection_id, event = %message.event, "outbox full, dropping event")
                }
                Delivery::Closed => debug!(connection_id = %connection_id, "skipping closed connection"),
            }
        }
        delivered
    }
}
