use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /chat
///
/// WebSocket upgrade endpoint. Identity is established in-band by the
/// `login` frame, so the upgrade itself is unauthenticated; an unbound
/// connection can do nothing but log in.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    actor::run_connection(socket, state).await;
}
