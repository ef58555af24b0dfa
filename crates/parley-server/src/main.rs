//! # parley-server
//!
//! Chat relay server for Parley.
//!
//! This binary provides:
//! - **WebSocket chat channel** (axum) with in-band login and real-time
//!   message fan-out to both participants of a conversation
//! - **SQLite persistence** so every routed message survives restarts
//! - **REST API** for health checks, attachment upload encoding, and
//!   conversation history

mod api;
mod config;
mod dispatch;
mod error;
mod registry;
mod session;
mod state;
mod ws;

use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_store::Database;

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug")),
        )
        .init();

    info!("Starting Parley chat server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        max_attachment_bytes = config.max_attachment_bytes,
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Open the message store (creates parent directory if missing)
    // -----------------------------------------------------------------------
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::open_at(&config.database_path)?;
    info!(path = %config.database_path.display(), "Message store ready");

    // -----------------------------------------------------------------------
    // 4. Wire shared state and run the server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState::new(db, config);

    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
