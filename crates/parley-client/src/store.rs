//! Per-peer message threads and unread counters.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_shared::protocol::ServerFrame;
use parley_shared::types::{MessageKind, UserId};

/// One element of the server's history response
/// (`GET /users/messages/:a/:b`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub file_name: Option<String>,
    pub text: Option<String>,
    pub file_base64: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// The local display shape of a message.
///
/// `id` is `None` for messages that arrived over the live channel; history
/// hydration fills ids in and deduplicates against them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub id: Option<i64>,
    pub sender_id: UserId,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub file_base64: Option<String>,
    pub file_name: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl From<HistoryEntry> for MessageView {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: Some(entry.id),
            sender_id: entry.sender_id,
            kind: entry.kind,
            text: entry.text,
            file_base64: entry.file_base64,
            file_name: entry.file_name,
            sent_at: entry.sent_at,
        }
    }
}

/// One conversation with a peer: an ordered message sequence plus an
/// unread counter.
#[derive(Debug, Default)]
struct PeerThread {
    messages: Vec<MessageView>,
    unread: u32,
}

/// Client-side chat state for one logged-in user.
#[derive(Debug)]
pub struct ChatState {
    me: UserId,
    threads: HashMap<UserId, PeerThread>,
    selected: Option<UserId>,
}

impl ChatState {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            threads: HashMap::new(),
            selected: None,
        }
    }

    /// Replace a peer's thread with the durable history fetched from the
    /// server, sorted by `sent_at` then `id` and deduplicated by id.
    ///
    /// Live messages appended before hydration completed are kept only if
    /// the history does not already contain them (no id means no dedupe
    /// handle, so unidentified live entries are dropped in favour of the
    /// authoritative transcript).
    pub fn hydrate_history(&mut self, peer: UserId, entries: Vec<HistoryEntry>) {
        let mut messages: Vec<MessageView> = entries.into_iter().map(MessageView::from).collect();
        messages.sort_by_key(|m| (m.sent_at, m.id));
        messages.dedup_by_key(|m| m.id);

        tracing::debug!(peer = %peer, count = messages.len(), "thread hydrated");
        self.threads.entry(peer).or_default().messages = messages;
    }

    /// Append a live broadcast frame to the matching peer thread.
    ///
    /// Returns the peer the message was filed under, or `None` if the frame
    /// is not a message or does not concern this user. Messages for a peer
    /// that is not currently selected bump that peer's unread counter.
    pub fn append(&mut self, frame: &ServerFrame) -> Option<UserId> {
        let ServerFrame::ReceiveMessage {
            sender_id,
            receiver_id,
            payload,
            kind,
            file_name,
            sent_at,
        } = frame
        else {
            return None;
        };

        let peer = self.peer_of(*sender_id, *receiver_id)?;
        let view = MessageView {
            id: None,
            sender_id: *sender_id,
            kind: *kind,
            text: (*kind == MessageKind::Text).then(|| payload.clone()),
            file_base64: kind.is_attachment().then(|| payload.clone()),
            file_name: file_name.clone(),
            sent_at: *sent_at,
        };

        let thread = self.threads.entry(peer).or_default();
        thread.messages.push(view);
        if *sender_id != self.me && self.selected != Some(peer) {
            thread.unread += 1;
        }
        Some(peer)
    }

    /// Select a peer: resets that peer's unread counter and returns the
    /// thread in display order.
    pub fn select_peer(&mut self, peer: UserId) -> &[MessageView] {
        self.selected = Some(peer);
        let thread = self.threads.entry(peer).or_default();
        thread.unread = 0;
        &thread.messages
    }

    /// Current unread count for a peer.
    pub fn unread(&self, peer: UserId) -> u32 {
        self.threads.get(&peer).map_or(0, |t| t.unread)
    }

    /// The other party of a message involving this user.
    fn peer_of(&self, sender: UserId, receiver: Option<UserId>) -> Option<UserId> {
        if sender == self.me {
            receiver
        } else if receiver == Some(self.me) {
            Some(sender)
        } else {
            None
        }
    }
}
