//! WebSocket chat channel: upgrade handling and the actor-per-connection
//! loop.

pub mod actor;
pub mod handler;
