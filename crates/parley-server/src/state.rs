//! Application state shared across HTTP handlers and WebSocket actors.

use std::sync::{Arc, Mutex};

use parley_store::Database;

use crate::config::ServerConfig;
use crate::dispatch::MessageDispatcher;
use crate::registry::ConnectionRegistry;

/// Handle to the message database.
///
/// `rusqlite` connections are not `Sync`, so the database sits behind a
/// mutex and all store calls go through `spawn_blocking`.
pub type SharedDb = Arc<Mutex<Database>>;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<MessageDispatcher>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let db: SharedDb = Arc::new(Mutex::new(db));
        let registry = Arc::new(ConnectionRegistry::new());
        let config = Arc::new(config);
        let dispatcher = Arc::new(MessageDispatcher::new(
            db.clone(),
            registry.clone(),
            config.max_attachment_bytes,
        ));

        Self {
            db,
            registry,
            dispatcher,
            config,
        }
    }
}
