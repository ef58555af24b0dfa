//! Session binding: connection <-> user identity.
//!
//! Each transport connection owns an explicit [`Session`] object; there is
//! no ambient connection-to-user map. The [`SessionManager`] mutates the
//! session and keeps the [`ConnectionRegistry`] consistent with it.

use std::sync::Arc;

use parley_shared::types::{ConnectionId, UserId};

use crate::registry::{ConnectionRegistry, Outbound};

/// Per-connection state, owned by the transport actor for that connection.
///
/// A session is bound to at most one identity at a time.
#[derive(Debug)]
pub struct Session {
    connection_id: ConnectionId,
    user_id: Option<UserId>,
}

impl Session {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            user_id: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// The bound identity, if the connection has logged in.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }
}

/// Binds and unbinds sessions against the connection registry.
pub struct SessionManager {
    registry: Arc<ConnectionRegistry>,
}

impl SessionManager {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Bind the connection to `user_id` and join that identity's group.
    ///
    /// Re-login with a different identity rebinds: the previous group
    /// membership is removed first, so a connection is never a member of
    /// two groups at once.
    pub fn login(&self, session: &mut Session, user_id: UserId, tx: Outbound) {
        if let Some(previous) = session.user_id {
            if previous != user_id {
                self.registry.leave(previous, session.connection_id);
            }
        }

        self.registry.join(user_id, session.connection_id, tx);
        session.user_id = Some(user_id);
        tracing::info!(
            connection = %session.connection_id,
            user = %user_id,
            "session bound"
        );
    }

    /// Remove the connection from its group and discard the binding.
    ///
    /// Must run on every disconnect path; a skipped call would leak a stale
    /// registry entry.
    pub fn disconnect(&self, session: &mut Session) {
        if let Some(user_id) = session.user_id.take() {
            self.registry.leave(user_id, session.connection_id);
            tracing::info!(
                connection = %session.connection_id,
                user = %user_id,
                "session unbound"
            );
        }
    }
}
