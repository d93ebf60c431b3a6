//! Connection/group registry
//!
//! Tracks which live connections belong to which broadcast groups. Both maps
//! are sharded (`DashMap`), so mutations for unrelated connections never
//! contend on a single lock.
//!
//! Lock order is always `connections` shard, then `groups` shard. Readers that
//! need both (broadcast snapshots) copy the member set out of `groups` and
//! release it before touching `connections`.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, info, warn};

use crate::protocol::HubEvent;
use crate::types::{ConnectionId, GroupKey, Identity};

/// Events a connection may have queued before new ones are dropped
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Result of pushing one event into an [`Outbox`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full; the event was dropped and counted as lag
    Lagged,
    /// The socket task is gone
    Closed,
}

/// Per-connection delivery channel, bounded
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Arc<HubEvent>>,
    lagged: Arc<AtomicU64>,
}

impl Outbox {
    /// Queue an event without waiting; a full queue drops it
    pub fn push(&self, event: Arc<HubEvent>) -> Delivery {
        match self.tx.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                self.lagged.fetch_add(1, Ordering::SeqCst);
                Delivery::Lagged
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Receiving half of an [`Outbox`]
pub struct Inbox {
    rx: mpsc::Receiver<Arc<HubEvent>>,
    lagged: Arc<AtomicU64>,
}

impl Inbox {
    pub async fn recv(&mut self) -> Option<Arc<HubEvent>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Arc<HubEvent>, TryRecvError> {
        self.rx.try_recv()
    }

    /// Events dropped since the last call
    pub fn take_lagged(&self) -> u64 {
        self.lagged.swap(0, Ordering::SeqCst)
    }
}

/// Create a connected outbox/inbox pair with the default capacity
pub fn outbox() -> (Outbox, Inbox) {
    bounded_outbox(DEFAULT_OUTBOX_CAPACITY)
}

/// Create a connected outbox/inbox pair holding at most `capacity` events
pub fn bounded_outbox(capacity: usize) -> (Outbox, Inbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let lagged = Arc::new(AtomicU64::new(0));
    (
        Outbox {
            tx,
            lagged: lagged.clone(),
        },
        Inbox { rx, lagged },
    )
}

/// Result of a join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Membership was added
    Joined,
    /// The connection was already a member
    AlreadyMember,
    /// The connection already holds a different group of the same family
    Conflict,
    /// No live connection with that id
    UnknownConnection,
    /// Empty id; nothing to join
    Ignored,
}

struct ConnectionEntry {
    identity: Identity,
    groups: BTreeSet<GroupKey>,
    outbox: Outbox,
}

/// Registry of live connections and their group memberships
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    groups: DashMap<GroupKey, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection and join the groups derived from its identity.
    ///
    /// Anonymous identities are registered with no groups. Registering an id
    /// that is already live replaces its outbox and keeps its memberships.
    /// Returns the connection's groups after registration.
    pub fn on_connect(
        &self,
        connection_id: &ConnectionId,
        identity: &Identity,
        outbox: Outbox,
    ) -> Vec<GroupKey> {
        self.connections
            .entry(connection_id.clone())
            .and_modify(|entry| entry.outbox = outbox.clone())
            .or_insert_with(|| ConnectionEntry {
                identity: identity.clone(),
                groups: BTreeSet::new(),
                outbox,
            });

        info!(
            connection_id = %connection_id,
            user_id = identity.user_id.as_deref().unwrap_or(""),
            role = identity.role.as_deref().unwrap_or(""),
            "connection registered"
        );

        for group in identity.groups() {
            self.join_group(connection_id, &group);
        }

        self.groups_of(connection_id)
    }

    /// Drop a connection and remove it from every group it belongs to.
    ///
    /// Returns the groups it was removed from, or `None` if it was not live.
    pub fn on_disconnect(&self, connection_id: &ConnectionId) -> Option<Vec<GroupKey>> {
        let (_, entry) = self.connections.remove(connection_id)?;

        for group in &entry.groups {
            self.groups.remove_if_mut(group, |_, members| {
                members.remove(connection_id);
                members.is_empty()
            });
        }

        info!(
            connection_id = %connection_id,
            user_id = entry.identity.user_id.as_deref().unwrap_or(""),
            groups = entry.groups.len(),
            "connection unregistered"
        );

        Some(entry.groups.into_iter().collect())
    }

    /// Unregister every connection. Their outboxes close, which ends the
    /// socket tasks. Returns how many were dropped.
    pub fn disconnect_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter(|id| self.on_disconnect(id).is_some())
            .count()
    }

    /// Client-requested join of `user_<lower(user_id)>`; no-op on an empty id
    pub fn join_user_group(&self, connection_id: &ConnectionId, user_id: &str) -> JoinOutcome {
        match GroupKey::user(user_id) {
            Some(group) => self.join_group(connection_id, &group),
            None => {
                debug!(connection_id = %connection_id, "ignoring join with empty user id");
                JoinOutcome::Ignored
            }
        }
    }

    /// Client-requested leave of `user_<lower(user_id)>`; no-op on an empty id
    pub fn leave_user_group(&self, connection_id: &ConnectionId, user_id: &str) -> bool {
        match GroupKey::user(user_id) {
            Some(group) => self.leave_group(connection_id, &group),
            None => false,
        }
    }

    /// Add a connection to a group.
    ///
    /// A connection holds at most one group per family; joining a second,
    /// different one is refused and the existing membership is kept.
    pub fn join_group(&self, connection_id: &ConnectionId, group: &GroupKey) -> JoinOutcome {
        let Some(mut entry) = self.connections.get_mut(connection_id) else {
            debug!(connection_id = %connection_id, group = %group, "join for unknown connection");
            return JoinOutcome::UnknownConnection;
        };

        if entry.groups.contains(group) {
            return JoinOutcome::AlreadyMember;
        }

        if let Some(existing) = entry.groups.iter().find(|g| g.family() == group.family()) {
            warn!(
                connection_id = %connection_id,
                group = %group,
                existing = %existing,
                "refusing second group of the same family"
            );
            return JoinOutcome::Conflict;
        }

        entry.groups.insert(group.clone());
        self.groups
            .entry(group.clone())
            .or_default()
            .insert(connection_id.clone());

        info!(connection_id = %connection_id, group = %group, "joined group");
        JoinOutcome::Joined
    }

    /// Remove a connection from a group. Returns whether it was a member.
    pub fn leave_group(&self, connection_id: &ConnectionId, group: &GroupKey) -> bool {
        let Some(mut entry) = self.connections.get_mut(connection_id) else {
            return false;
        };

        if !entry.groups.remove(group) {
            return false;
        }

        self.groups.remove_if_mut(group, |_, members| {
            members.remove(connection_id);
            members.is_empty()
        });

        info!(connection_id = %connection_id, group = %group, "left group");
        true
    }

    /// Groups a connection currently belongs to (empty if not live)
    pub fn groups_of(&self, connection_id: &ConnectionId) -> Vec<GroupKey> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.groups.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Connections currently in a group
    pub fn members_of(&self, group: &GroupKey) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the outboxes of a group's members
    pub(crate) fn outboxes_in(&self, group: &GroupKey) -> Vec<(ConnectionId, Outbox)> {
        let members = self.members_of(group);
        members
            .into_iter()
            .filter_map(|id| {
                let outbox = self.connections.get(&id)?.outbox.clone();
                Some((id, outbox))
            })
            .collect()
    }

    /// Snapshot of every live outbox
    pub(crate) fn all_outboxes(&self) -> Vec<(ConnectionId, Outbox)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.outbox.clone()))
            .collect()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of non-empty groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn names(groups: &[GroupKey]) -> Vec<String> {
        let mut names: Vec<_> = groups.iter().map(|g| g.to_string()).collect();
        names.sort();
        names
    }

    fn connect(registry: &ConnectionRegistry, id: &str, identity: Identity) -> Inbox {
        let (tx, rx) = outbox();
        registry.on_connect(&ConnectionId::from(id), &identity, tx);
        rx
    }

    #[test]
    fn test_connect_joins_user_and_role_groups() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbox();
        let groups = registry.on_connect(&"c1".into(), &Identity::new("abc", "Admin"), tx);

        assert_eq!(names(&groups), vec!["role_admin", "user_abc"]);
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.group_count(), 2);
    }

    #[test]
    fn test_anonymous_connection_has_no_groups() {
        let registry = ConnectionRegistry::new();
        let _rx = connect(&registry, "c1", Identity::anonymous());

        assert!(registry.contains(&"c1".into()));
        assert!(registry.groups_of(&"c1".into()).is_empty());
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn test_reconnect_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let _rx1 = connect(&registry, "c1", Identity::new("abc", "Admin"));
        let _rx2 = connect(&registry, "c1", Identity::new("abc", "Admin"));

        assert_eq!(names(&registry.groups_of(&"c1".into())), vec!["role_admin", "user_abc"]);
        assert_eq!(registry.members_of(&GroupKey::user("abc").unwrap()).len(), 1);
    }

    #[test]
    fn test_disconnect_removes_every_membership() {
        let registry = ConnectionRegistry::new();
        let _rx = connect(&registry, "c1", Identity::new("abc", "Admin"));

        let removed = registry.on_disconnect(&"c1".into()).unwrap();
        assert_eq!(names(&removed), vec!["role_admin", "user_abc"]);

        assert!(!registry.contains(&"c1".into()));
        assert!(registry.members_of(&GroupKey::user("abc").unwrap()).is_empty());
        assert!(registry.members_of(&GroupKey::role("admin").unwrap()).is_empty());
        assert_eq!(registry.group_count(), 0);
        assert!(registry.on_disconnect(&"c1".into()).is_none());
    }

    #[test]
    fn test_disconnect_keeps_other_members() {
        let registry = ConnectionRegistry::new();
        let _rx1 = connect(&registry, "c1", Identity::new("abc", "Admin"));
        let _rx2 = connect(&registry, "c2", Identity::new("def", "admin"));

        registry.on_disconnect(&"c1".into());

        let admins = registry.members_of(&GroupKey::role("ADMIN").unwrap());
        assert_eq!(admins, vec![ConnectionId::from("c2")]);
    }

    #[test]
    fn test_explicit_join_and_leave() {
        let registry = ConnectionRegistry::new();
        let _rx = connect(&registry, "c1", Identity::anonymous());
        let id = ConnectionId::from("c1");

        assert_eq!(registry.join_user_group(&id, "ABC"), JoinOutcome::Joined);
        assert_eq!(registry.join_user_group(&id, "abc"), JoinOutcome::AlreadyMember);
        assert_eq!(names(&registry.groups_of(&id)), vec!["user_abc"]);

        assert!(registry.leave_user_group(&id, "Abc"));
        assert!(!registry.leave_user_group(&id, "abc"));
        assert!(registry.groups_of(&id).is_empty());
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn test_empty_user_id_is_ignored() {
        let registry = ConnectionRegistry::new();
        let _rx = connect(&registry, "c1", Identity::anonymous());
        let id = ConnectionId::from("c1");

        assert_eq!(registry.join_user_group(&id, ""), JoinOutcome::Ignored);
        assert!(!registry.leave_user_group(&id, ""));
        assert!(registry.groups_of(&id).is_empty());
    }

    #[test]
    fn test_second_user_group_is_refused() {
        let registry = ConnectionRegistry::new();
        let _rx = connect(&registry, "c1", Identity::user("abc"));
        let id = ConnectionId::from("c1");

        assert_eq!(registry.join_user_group(&id, "other"), JoinOutcome::Conflict);
        assert_eq!(names(&registry.groups_of(&id)), vec!["user_abc"]);
    }

    #[test]
    fn test_join_unknown_connection() {
        let registry = ConnectionRegistry::new();
        assert_eq!(
            registry.join_user_group(&"ghost".into(), "abc"),
            JoinOutcome::UnknownConnection
        );
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn test_concurrent_connections_do_not_interfere() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = vec![];

        for t in 0..8 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                let mut inboxes = vec![];
                for i in 0..100 {
                    let id = ConnectionId::from(format!("c-{}-{}", t, i));
                    let (tx, rx) = outbox();
                    inboxes.push(rx);
                    registry.on_connect(&id, &Identity::new(format!("u{}", i), "Candidate"), tx);
                    if i % 2 == 0 {
                        registry.on_disconnect(&id);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.connection_count(), 8 * 50);
        assert_eq!(registry.members_of(&GroupKey::role("candidate").unwrap()).len(), 8 * 50);
        assert_eq!(registry.members_of(&GroupKey::user("u1").unwrap()).len(), 8);
        assert!(registry.members_of(&GroupKey::user("u0").unwrap()).is_empty());
    }

    #[test]
    fn test_outbox_stops_at_capacity() {
        let (tx, mut rx) = bounded_outbox(4);
        let event = Arc::new(HubEvent::new("receivenewjob", serde_json::Value::Null, 0));

        let outcomes: Vec<Delivery> = (0..10).map(|_| tx.push(event.clone())).collect();
        assert_eq!(outcomes.iter().filter(|d| **d == Delivery::Queued).count(), 4);
        assert_eq!(outcomes[4..], [Delivery::Lagged; 6]);

        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 4);
        assert_eq!(rx.take_lagged(), 6);
        assert_eq!(rx.take_lagged(), 0);

        // Draining frees room again
        assert_eq!(tx.push(event.clone()), Delivery::Queued);
        drop(rx);
        assert_eq!(tx.push(event), Delivery::Closed);
    }

    #[test]
    fn test_disconnect_all_closes_outboxes() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = outbox();
        registry.on_connect(&"c1".into(), &Identity::new("abc", "Admin"), tx);
        let (tx, _rx) = outbox();
        registry.on_connect(&"c2".into(), &Identity::anonymous(), tx);

        assert_eq!(registry.disconnect_all(), 2);
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.group_count(), 0);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }
}
