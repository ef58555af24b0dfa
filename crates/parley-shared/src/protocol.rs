use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageKind, UserId};

/// Frames sent by a client over the real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Bind this connection to a user identity.
    #[serde(rename_all = "camelCase")]
    Login { user_id: UserId },

    /// Send a message to another user.
    ///
    /// `payload` is raw text for `kind == Text`, or an attachment envelope
    /// for `Image`/`File`.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        receiver_id: Option<UserId>,
        payload: String,
        #[serde(rename = "type")]
        kind: MessageKind,
        file_name: Option<String>,
    },
}

/// Frames pushed by the server over the real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ServerFrame {
    /// A message delivered to a live member of the sender's or receiver's
    /// group.
    #[serde(rename_all = "camelCase")]
    ReceiveMessage {
        sender_id: UserId,
        receiver_id: Option<UserId>,
        payload: String,
        #[serde(rename = "type")]
        kind: MessageKind,
        file_name: Option<String>,
        sent_at: DateTime<Utc>,
    },

    /// A dispatch failure, surfaced to the originating sender only.
    #[serde(rename_all = "camelCase")]
    Error { reason: String },
}

impl ClientFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

impl ServerFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
