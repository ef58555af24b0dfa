//! Message dispatch: the validate -> persist -> broadcast sequence behind
//! every send request.
//!
//! Each message moves through `Pending -> Persisted -> Delivered`, or
//! `Pending -> Failed` when the store rejects the write. Persistence always
//! happens before broadcast, so history queries are a superset of what was
//! ever delivered live; a crash between the two steps leaves a persisted
//! message that the receiver recovers by hydrating history.

use std::sync::Arc;

use thiserror::Error;

use parley_shared::attachment;
use parley_shared::protocol::ServerFrame;
use parley_shared::types::{DeliveryState, MessageKind, UserId};
use parley_shared::AttachmentError;
use parley_store::{MessageBody, NewMessage, StoredMessage};

use crate::registry::ConnectionRegistry;
use crate::session::Session;
use crate::state::SharedDb;

/// Dispatch failures. All of these are surfaced to the originating sender
/// only and never broadcast.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Send attempted before login.
    #[error("Not logged in")]
    Unauthenticated,

    /// Empty text, zero-byte or oversized attachment, missing receiver.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed attachment envelope.
    #[error("Attachment decode failed: {0}")]
    AttachmentDecode(AttachmentError),

    /// Persistence I/O failure. The failed store leaves no partial record,
    /// so a caller-side retry is always safe.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub struct MessageDispatcher {
    db: SharedDb,
    registry: Arc<ConnectionRegistry>,
    max_attachment_bytes: usize,
}

impl MessageDispatcher {
    pub fn new(
        db: SharedDb,
        registry: Arc<ConnectionRegistry>,
        max_attachment_bytes: usize,
    ) -> Self {
        Self {
            db,
            registry,
            max_attachment_bytes,
        }
    }

    /// Dispatch one message from a live connection.
    ///
    /// On success the message has been durably stored and broadcast to the
    /// sender's and receiver's groups; delivery to zero live connections is
    /// not an error.
    pub async fn send(
        &self,
        session: &Session,
        receiver_id: Option<UserId>,
        payload: String,
        kind: MessageKind,
        file_name: Option<String>,
    ) -> Result<StoredMessage, DispatchError> {
        // 1. The connection must be bound to an identity. Nothing is
        //    persisted and no state transition occurs otherwise.
        let sender_id = session.user_id().ok_or(DispatchError::Unauthenticated)?;

        // Null receiver is reserved for group chat, which has no fan-out
        // behavior; reject it at the boundary.
        let receiver = receiver_id.ok_or_else(|| {
            DispatchError::Validation("receiverId is required".to_string())
        })?;

        // 2. Resolve the body. A malformed envelope never enters Pending.
        let body = self.resolve_body(&payload, kind, file_name)?;
        body.validate().map_err(DispatchError::Validation)?;

        let mut state = DeliveryState::Pending;
        tracing::debug!(sender = %sender_id, receiver = %receiver, kind = %kind, ?state, "dispatching");

        // 3. Persist. Id and timestamp are assigned atomically with the
        //    write; failure moves the message to Failed with no broadcast.
        let candidate = NewMessage {
            sender_id,
            receiver_id: Some(receiver),
            body,
        };
        let stored = match self.store(candidate).await {
            Ok(stored) => {
                state = state.advance(DeliveryState::Persisted).unwrap_or(state);
                stored
            }
            Err(err) => {
                state = state.advance(DeliveryState::Failed).unwrap_or(state);
                tracing::warn!(sender = %sender_id, ?state, error = %err, "store failed");
                return Err(err);
            }
        };

        // 4. Broadcast to both groups. Fire-and-forget: the message is
        //    Delivered no matter how many connections were reached.
        let frame = ServerFrame::ReceiveMessage {
            sender_id,
            receiver_id: Some(receiver),
            payload,
            kind: stored.body.kind(),
            file_name: match &stored.body {
                MessageBody::Binary { file_name, .. } => Some(file_name.clone()),
                MessageBody::Text(_) => None,
            },
            sent_at: stored.sent_at,
        };

        let mut attempted = self.registry.broadcast(sender_id, &frame);
        if receiver != sender_id {
            attempted += self.registry.broadcast(receiver, &frame);
        }
        state = state.advance(DeliveryState::Delivered).unwrap_or(state);
        tracing::debug!(id = stored.id, attempted, ?state, "message dispatched");

        Ok(stored)
    }

    /// Turn the wire payload into a storable body. Attachment kinds decode
    /// the envelope (size-capped before allocation); the envelope itself is
    /// never stored.
    fn resolve_body(
        &self,
        payload: &str,
        kind: MessageKind,
        file_name: Option<String>,
    ) -> Result<MessageBody, DispatchError> {
        if !kind.is_attachment() {
            return Ok(MessageBody::Text(payload.to_string()));
        }

        let (bytes, mime_type) =
            attachment::decode_with_limit(payload, self.max_attachment_bytes).map_err(|e| {
                match e {
                    AttachmentError::TooLarge { estimated, max } => DispatchError::Validation(
                        format!("attachment too large: ~{estimated} bytes (max {max})"),
                    ),
                    other => DispatchError::AttachmentDecode(other),
                }
            })?;

        Ok(MessageBody::Binary {
            bytes,
            file_name: file_name.unwrap_or_default(),
            mime_type,
        })
    }

    async fn store(&self, candidate: NewMessage) -> Result<StoredMessage, DispatchError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| DispatchError::StorageUnavailable("store lock poisoned".into()))?;
            guard.insert_message(&candidate).map_err(|e| match e {
                parley_store::StoreError::InvalidBody(msg) => DispatchError::Validation(msg),
                other => DispatchError::StorageUnavailable(other.to_string()),
            })
        })
        .await
        .map_err(|e| DispatchError::StorageUnavailable(format!("store task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_shared::types::ConnectionId;
    use parley_store::Database;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    use crate::session::SessionManager;

    fn dispatcher() -> (Arc<ConnectionRegistry>, SessionManager, MessageDispatcher, SharedDb) {
        let db: SharedDb = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let registry = Arc::new(ConnectionRegistry::new());
        let manager = SessionManager::new(registry.clone());
        let dispatcher = MessageDispatcher::new(db.clone(), registry.clone(), 1024 * 1024);
        (registry, manager, dispatcher, db)
    }

    fn logged_in(manager: &SessionManager, user: i64) -> (Session, mpsc::UnboundedReceiver<ServerFrame>) {
        let mut session = Session::new(ConnectionId::new());
        let (tx, rx) = mpsc::unbounded_channel();
        manager.login(&mut session, UserId(user), tx);
        (session, rx)
    }

    #[tokio::test]
    async fn unauthenticated_send_persists_nothing() {
        let (_registry, _manager, dispatcher, db) = dispatcher();
        let session = Session::new(ConnectionId::new());

        let err = dispatcher
            .send(&session, Some(UserId(9)), "hello".into(), MessageKind::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unauthenticated));

        let history = db.lock().unwrap().history(UserId(7), UserId(9)).unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn text_send_persists_and_reaches_both_groups() {
        let (_registry, manager, dispatcher, db) = dispatcher();
        let (sender_session, mut sender_rx) = logged_in(&manager, 7);
        let (_receiver_session, mut receiver_rx) = logged_in(&manager, 9);

        let stored = dispatcher
            .send(
                &sender_session,
                Some(UserId(9)),
                "hello".into(),
                MessageKind::Text,
                None,
            )
            .await
            .unwrap();

        assert_eq!(stored.sender_id, UserId(7));
        assert_eq!(stored.body, MessageBody::Text("hello".into()));

        // Both the sender's and the receiver's group saw the frame.
        let echoed = sender_rx.recv().await.unwrap();
        let delivered = receiver_rx.recv().await.unwrap();
        assert_eq!(echoed, delivered);
        match delivered {
            ServerFrame::ReceiveMessage {
                sender_id, payload, kind, ..
            } => {
                assert_eq!(sender_id, UserId(7));
                assert_eq!(payload, "hello");
                assert_eq!(kind, MessageKind::Text);
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        // And the durable transcript agrees.
        let history = db.lock().unwrap().history(UserId(7), UserId(9)).unwrap();
        assert_eq!(history, vec![stored]);
    }

    #[tokio::test]
    async fn attachment_send_stores_decoded_bytes() {
        let (_registry, manager, dispatcher, db) = dispatcher();
        let (session, _rx) = logged_in(&manager, 3);

        let original = vec![0x89u8, 0x50, 0x4e, 0x47, 0x00, 0xff];
        let envelope = attachment::encode(&original, "image/png");

        let stored = dispatcher
            .send(
                &session,
                Some(UserId(5)),
                envelope.clone(),
                MessageKind::Image,
                Some("cat.png".into()),
            )
            .await
            .unwrap();

        match &stored.body {
            MessageBody::Binary {
                bytes,
                file_name,
                mime_type,
            } => {
                assert_eq!(bytes, &original);
                assert_eq!(file_name, "cat.png");
                assert_eq!(mime_type, "image/png");
            }
            other => panic!("expected binary body, got {other:?}"),
        }

        let history = db.lock().unwrap().history(UserId(5), UserId(3)).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn attachment_frame_carries_the_original_envelope() {
        let (_registry, manager, dispatcher, _db) = dispatcher();
        let (sender_session, _sender_rx) = logged_in(&manager, 3);
        let (_receiver_session, mut receiver_rx) = logged_in(&manager, 5);

        let original = b"gif bytes".to_vec();
        let envelope = attachment::encode(&original, "image/gif");

        dispatcher
            .send(
                &sender_session,
                Some(UserId(5)),
                envelope.clone(),
                MessageKind::Image,
                Some("loop.gif".into()),
            )
            .await
            .unwrap();

        match receiver_rx.recv().await.unwrap() {
            ServerFrame::ReceiveMessage {
                payload, file_name, ..
            } => {
                assert_eq!(payload, envelope);
                assert_eq!(file_name.as_deref(), Some("loop.gif"));
                let (bytes, mime) = attachment::decode(&payload).unwrap();
                assert_eq!(bytes, original);
                assert_eq!(mime, "image/gif");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_envelope_never_enters_pending() {
        let (_registry, manager, dispatcher, db) = dispatcher();
        let (session, _rx) = logged_in(&manager, 3);

        let err = dispatcher
            .send(
                &session,
                Some(UserId(5)),
                "not an envelope".into(),
                MessageKind::File,
                Some("x.bin".into()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AttachmentDecode(_)));

        let history = db.lock().unwrap().history(UserId(3), UserId(5)).unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn oversized_attachment_is_a_validation_error() {
        let db: SharedDb = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let registry = Arc::new(ConnectionRegistry::new());
        let manager = SessionManager::new(registry.clone());
        let dispatcher = MessageDispatcher::new(db, registry, 16);
        let (session, _rx) = logged_in(&manager, 3);

        let envelope = attachment::encode(&[0u8; 64], "application/pdf");
        let err = dispatcher
            .send(
                &session,
                Some(UserId(5)),
                envelope,
                MessageKind::File,
                Some("big.pdf".into()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_text_is_a_validation_error() {
        let (_registry, manager, dispatcher, _db) = dispatcher();
        let (session, _rx) = logged_in(&manager, 7);

        let err = dispatcher
            .send(&session, Some(UserId(9)), "   ".into(), MessageKind::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_receiver_is_rejected() {
        let (_registry, manager, dispatcher, _db) = dispatcher();
        let (session, _rx) = logged_in(&manager, 7);

        let err = dispatcher
            .send(&session, None, "hello".into(), MessageKind::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn self_message_broadcasts_once_per_connection() {
        let (_registry, manager, dispatcher, _db) = dispatcher();
        let (session, mut rx) = logged_in(&manager, 7);

        dispatcher
            .send(&session, Some(UserId(7)), "note to self".into(), MessageKind::Text, None)
            .await
            .unwrap();

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err(), "no duplicate for sender == receiver");
    }
}
