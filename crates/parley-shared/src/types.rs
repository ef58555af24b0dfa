use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity = opaque numeric id owned by the external directory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live transport session between a client and the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a message body as declared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "file" => Some(Self::File),
            _ => None,
        }
    }

    /// Whether the payload for this kind is an attachment envelope.
    pub fn is_attachment(self) -> bool {
        matches!(self, Self::Image | Self::File)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a message as it moves through dispatch.
///
/// Transitions only ever move forward: `Pending -> Persisted -> Delivered`,
/// or `Pending -> Failed`. A `Failed` message is never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Persisted,
    Delivered,
    Failed,
}

impl DeliveryState {
    /// Attempt a forward transition. Returns the new state, or `None` if the
    /// transition would move backwards or resurrect a failed message.
    pub fn advance(self, next: DeliveryState) -> Option<DeliveryState> {
        use DeliveryState::*;
        match (self, next) {
            (Pending, Persisted) | (Pending, Failed) | (Persisted, Delivered) => Some(next),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_str_roundtrip() {
        for kind in [MessageKind::Text, MessageKind::Image, MessageKind::File] {
            assert_eq!(MessageKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::from_str("video"), None);
    }

    #[test]
    fn delivery_state_moves_forward_only() {
        use DeliveryState::*;
        assert_eq!(Pending.advance(Persisted), Some(Persisted));
        assert_eq!(Persisted.advance(Delivered), Some(Delivered));
        assert_eq!(Pending.advance(Failed), Some(Failed));

        // No resurrection, no skipping, no going back.
        assert_eq!(Failed.advance(Persisted), None);
        assert_eq!(Failed.advance(Delivered), None);
        assert_eq!(Delivered.advance(Pending), None);
        assert_eq!(Pending.advance(Delivered), None);
        assert_eq!(Persisted.advance(Failed), None);
    }
}
