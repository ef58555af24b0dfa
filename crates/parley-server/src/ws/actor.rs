//! Actor-per-connection loop for the chat channel.
//!
//! Each connection splits into a reader and a writer half:
//! - the writer task owns the sink and forwards frames from an mpsc channel;
//! - the reader loop decodes inbound JSON frames and drives the session
//!   manager and dispatcher.
//!
//! The reader awaits each dispatch before reading the next frame, which is
//! what guarantees per-connection send ordering. Unregistration runs on
//! every exit path, so no stale registry entry survives a disconnect.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use parley_shared::protocol::{ClientFrame, ServerFrame};
use parley_shared::types::ConnectionId;

use crate::registry::Outbound;
use crate::session::{Session, SessionManager};
use crate::state::AppState;

pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerFrame>();

    let mut session = Session::new(ConnectionId::new());
    let sessions = SessionManager::new(state.registry.clone());

    tracing::info!(connection = %session.connection_id(), "chat connection opened");

    // Writer task: forwards mpsc frames to the WebSocket sink.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Reader loop: one handler invocation per inbound frame.
    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_frame(&text, &tx, &state, &sessions, &mut session).await;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Liveness is the transport layer's concern; the websocket
                // stack answers pings on its own.
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!(
                    connection = %session.connection_id(),
                    "ignoring binary frame on text protocol"
                );
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(
                    connection = %session.connection_id(),
                    reason = ?frame,
                    "client initiated close"
                );
                break;
            }
            Some(Err(e)) => {
                tracing::warn!(
                    connection = %session.connection_id(),
                    error = %e,
                    "websocket receive error"
                );
                break;
            }
            None => break,
        }
    }

    // Cleanup: every exit path lands here.
    writer_handle.abort();
    sessions.disconnect(&mut session);
    tracing::info!(connection = %session.connection_id(), "chat connection closed");
}

async fn handle_frame(
    text: &str,
    tx: &Outbound,
    state: &AppState,
    sessions: &SessionManager,
    session: &mut Session,
) {
    match ClientFrame::from_json(text) {
        Ok(ClientFrame::Login { user_id }) => {
            sessions.login(session, user_id, tx.clone());
        }
        Ok(ClientFrame::SendMessage {
            receiver_id,
            payload,
            kind,
            file_name,
        }) => {
            let result = state
                .dispatcher
                .send(session, receiver_id, payload, kind, file_name)
                .await;

            // Hard failures go back to the originating sender only.
            if let Err(err) = result {
                tracing::warn!(
                    connection = %session.connection_id(),
                    error = %err,
                    "dispatch failed"
                );
                let _ = tx.send(ServerFrame::Error {
                    reason: err.to_string(),
                });
            }
        }
        Err(e) => {
            tracing::debug!(
                connection = %session.connection_id(),
                error = %e,
                "unparseable client frame"
            );
            let _ = tx.send(ServerFrame::Error {
                reason: format!("Malformed frame: {e}"),
            });
        }
    }
}

/// Writer task: receives frames from the mpsc channel and forwards them to
/// the WebSocket sink as JSON text.
async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<ServerFrame>,
) {
    while let Some(frame) = rx.recv().await {
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode server frame");
                continue;
            }
        };
        if ws_sender.send(Message::Text(json)).await.is_err() {
            // WebSocket send failed; the connection is gone.
            break;
        }
    }
}
