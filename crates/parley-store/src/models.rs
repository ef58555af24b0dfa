//! Domain model structs persisted in the message store.
//!
//! Messages reference their participants by identity key only; any
//! "messages for this user" view is computed by a query, never by an owned
//! back-reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_shared::attachment;
use parley_shared::types::{MessageKind, UserId};

/// The content of a message: either plain text or a decoded binary
/// attachment. The wire envelope form is never stored; the media type is
/// kept so history responses can rebuild the envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Binary {
        bytes: Vec<u8>,
        file_name: String,
        mime_type: String,
    },
}

impl MessageBody {
    /// The wire kind for this body.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Binary { mime_type, .. } => attachment::classify(mime_type),
        }
    }

    /// Check the body invariants: a text body is never empty, a binary body
    /// always has non-empty payload, file name, and media type.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Text(text) if text.trim().is_empty() => {
                Err("text body must not be empty".to_string())
            }
            Self::Binary { bytes, .. } if bytes.is_empty() => {
                Err("attachment payload must not be empty".to_string())
            }
            Self::Binary { file_name, .. } if file_name.is_empty() => {
                Err("attachment file name must not be empty".to_string())
            }
            Self::Binary { mime_type, .. } if mime_type.is_empty() => {
                Err("attachment media type must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// A candidate message, before the store assigns identity and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: UserId,
    /// `None` is reserved for future group chat; no fan-out is implemented.
    pub receiver_id: Option<UserId>,
    pub body: MessageBody,
}

/// A message once persisted. Immutable from this point on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    /// Monotonically increasing id assigned by the store.
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub body: MessageBody,
    /// UTC timestamp assigned atomically with the write.
    pub sent_at: DateTime<Utc>,
}
