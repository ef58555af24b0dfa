//! Connection registry: the concurrent map from user identity ("group") to
//! the set of live connections bound to it.
//!
//! Each group is one `DashMap` entry, so synchronization is per-group: a
//! busy conversation never blocks joins, leaves, or broadcasts on unrelated
//! groups. Broadcast delivery is best-effort, at-most-once per connection
//! that was a member when the snapshot was taken; durable history is the
//! recovery path for anything missed live.

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc;

use parley_shared::protocol::ServerFrame;
use parley_shared::types::{ConnectionId, UserId};

/// Sender half of a connection's outbound frame channel. Cloneable so any
/// part of the system can push frames to that connection's writer task.
pub type Outbound = mpsc::UnboundedSender<ServerFrame>;

#[derive(Default)]
pub struct ConnectionRegistry {
    groups: DashMap<UserId, HashMap<ConnectionId, Outbound>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a user's group. Idempotent: re-joining replaces
    /// the stored sender without duplicating membership.
    pub fn join(&self, user_id: UserId, connection_id: ConnectionId, tx: Outbound) {
        let mut members = self.groups.entry(user_id).or_default();
        members.insert(connection_id, tx);
        tracing::debug!(
            user = %user_id,
            connection = %connection_id,
            connections = members.len(),
            "connection joined group"
        );
    }

    /// Remove a connection from a user's group. Idempotent; a group whose
    /// last member leaves is removed entirely, so no stale ids survive.
    pub fn leave(&self, user_id: UserId, connection_id: ConnectionId) {
        let mut empty = false;
        if let Some(mut members) = self.groups.get_mut(&user_id) {
            members.remove(&connection_id);
            empty = members.is_empty();
        }
        if empty {
            self.groups.remove_if(&user_id, |_, members| members.is_empty());
        }
        tracing::debug!(user = %user_id, connection = %connection_id, "connection left group");
    }

    /// Deliver a frame to every connection in the group, as of a snapshot
    /// taken at call time. Returns the number of connections attempted.
    ///
    /// A connection that is mid-disconnect may silently miss the frame;
    /// that is not an error and does not affect delivery to the others.
    pub fn broadcast(&self, user_id: UserId, frame: &ServerFrame) -> usize {
        let snapshot: Vec<(ConnectionId, Outbound)> = match self.groups.get(&user_id) {
            Some(members) => members
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect(),
            None => return 0,
        };

        let attempted = snapshot.len();
        for (connection_id, tx) in snapshot {
            if tx.send(frame.clone()).is_err() {
                tracing::debug!(
                    user = %user_id,
                    connection = %connection_id,
                    "connection lost mid-broadcast"
                );
            }
        }
        attempted
    }

    /// Number of live connections currently bound to a user.
    pub fn group_size(&self, user_id: UserId) -> usize {
        self.groups.get(&user_id).map_or(0, |members| members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> ServerFrame {
        ServerFrame::Error {
            reason: text.to_string(),
        }
    }

    #[test]
    fn join_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.join(UserId(1), conn, tx.clone());
        registry.join(UserId(1), conn, tx);
        assert_eq!(registry.group_size(UserId(1)), 1);
    }

    #[test]
    fn leave_removes_empty_group() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.join(UserId(1), conn, tx);
        registry.leave(UserId(1), conn);
        assert_eq!(registry.group_size(UserId(1)), 0);

        // Leaving again is a no-op.
        registry.leave(UserId(1), conn);
        assert_eq!(registry.group_size(UserId(1)), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_device_once() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        // Two devices logged in as the same user.
        registry.join(UserId(1), ConnectionId::new(), tx_a);
        registry.join(UserId(1), ConnectionId::new(), tx_b);

        let attempted = registry.broadcast(UserId(1), &frame("hello"));
        assert_eq!(attempted, 2);

        assert_eq!(rx_a.recv().await, Some(frame("hello")));
        assert_eq!(rx_b.recv().await, Some(frame("hello")));
        assert!(rx_a.try_recv().is_err(), "exactly once per connection");
    }

    #[test]
    fn broadcast_to_absent_group_is_zero() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.broadcast(UserId(42), &frame("nobody home")), 0);
    }

    #[test]
    fn broadcast_survives_closed_receiver() {
        let registry = ConnectionRegistry::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        drop(rx_dead);

        registry.join(UserId(1), ConnectionId::new(), tx_dead);
        registry.join(UserId(1), ConnectionId::new(), tx_live);

        // The dead connection does not abort delivery to the live one.
        let attempted = registry.broadcast(UserId(1), &frame("still here"));
        assert_eq!(attempted, 2);
        assert_eq!(rx_live.try_recv().unwrap(), frame("still here"));
    }
}
