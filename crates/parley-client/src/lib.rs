//! # parley-client
//!
//! Peer-side message state for a Parley chat client: per-peer ordered
//! message threads, unread counters, and hydration from the server's
//! durable history.
//!
//! This store is advisory; the durable source of truth is always the
//! server's history endpoint, which a client re-queries when it selects a
//! peer.

pub mod store;

pub use store::{ChatState, HistoryEntry, MessageView};
