//! # parley-store
//!
//! Durable, ordered message store for Parley.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for persisting and
//! querying chat messages. Identity (`id`) and timestamp (`sent_at`) are
//! assigned atomically with each write; ids are strictly increasing across
//! the whole store.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
