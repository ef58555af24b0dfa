//! HTTP surface: attachment upload, history queries, health, and the
//! WebSocket upgrade route.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_shared::attachment;
use parley_shared::types::{MessageKind, UserId};
use parley_store::{MessageBody, StoredMessage};

use crate::error::ServerError;
use crate::state::AppState;
use crate::ws;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    // The multipart body carries raw attachment bytes plus form overhead.
    let body_limit = state.config.max_attachment_bytes + 1024 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/chat", get(ws::handler::ws_upgrade))
        .route("/files/upload", post(file_upload))
        .route("/users/messages/:user_a/:user_b", get(message_history))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_base64: String,
    #[serde(rename = "type")]
    kind: MessageKind,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    id: i64,
    sender_id: UserId,
    receiver_id: Option<UserId>,
    #[serde(rename = "type")]
    kind: MessageKind,
    file_name: Option<String>,
    text: Option<String>,
    file_base64: Option<String>,
    sent_at: DateTime<Utc>,
}

impl From<StoredMessage> for HistoryEntry {
    fn from(message: StoredMessage) -> Self {
        let kind = message.body.kind();
        let (text, file_base64, file_name) = match message.body {
            MessageBody::Text(text) => (Some(text), None, None),
            MessageBody::Binary {
                bytes,
                file_name,
                mime_type,
            } => (
                None,
                // Rebuild the transit envelope for the text-oriented response.
                Some(attachment::encode(&bytes, &mime_type)),
                Some(file_name),
            ),
        };

        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            kind,
            file_name,
            text,
            file_base64,
            sent_at: message.sent_at,
        }
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /files/upload
///
/// Resolve an uploaded file into its transit envelope and wire kind. This
/// is a pure codec service: nothing is persisted until the client sends the
/// envelope through the chat channel.
async fn file_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let mut file: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
            file = Some((data.to_vec(), content_type));
        }
        // senderId / receiverId fields are accepted but unused here; the
        // sender is established by the chat channel's login binding.
    }

    let Some((data, content_type)) = file else {
        return Err(ServerError::BadRequest("No file uploaded".to_string()));
    };
    if data.is_empty() {
        return Err(ServerError::BadRequest("No file uploaded".to_string()));
    }
    if data.len() > state.config.max_attachment_bytes {
        return Err(ServerError::PayloadTooLarge {
            size: data.len(),
            max: state.config.max_attachment_bytes,
        });
    }

    let kind = attachment::classify(&content_type);
    let envelope = attachment::encode(&data, &content_type);

    info!(size = data.len(), %kind, "attachment encoded for transit");

    Ok(Json(UploadResponse {
        file_base64: envelope,
        kind,
    }))
}

/// GET /users/messages/:user_a/:user_b
///
/// The durable transcript between two users, ascending by time then id.
/// Symmetric in its arguments.
async fn message_history(
    State(state): State<AppState>,
    Path((user_a, user_b)): Path<(i64, i64)>,
) -> Result<Json<Vec<HistoryEntry>>, ServerError> {
    let db = state.db.clone();
    let messages = tokio::task::spawn_blocking(move || {
        let guard = db
            .lock()
            .map_err(|_| ServerError::Internal("store lock poisoned".to_string()))?;
        guard
            .history(UserId(user_a), UserId(user_b))
            .map_err(|e| ServerError::Internal(format!("history query failed: {e}")))
    })
    .await
    .map_err(|e| ServerError::Internal(format!("history task failed: {e}")))??;

    Ok(Json(messages.into_iter().map(HistoryEntry::from).collect()))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
