//! Message persistence and history queries.
//!
//! `sent_at` is stored as fixed-width RFC 3339 (microseconds, `Z` suffix)
//! so that textual ordering equals chronological ordering; `id` breaks ties.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use parley_shared::types::{MessageKind, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{MessageBody, NewMessage, StoredMessage};

impl Database {
    /// Persist a candidate message, assigning its id and timestamp
    /// atomically with the write.
    ///
    /// The insert is a single row, so metadata and attachment bytes are
    /// all-or-nothing: a failed insert leaves no partial record.
    pub fn insert_message(&self, message: &NewMessage) -> Result<StoredMessage> {
        message.body.validate().map_err(StoreError::InvalidBody)?;

        let sent_at_raw = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        // Round-trip through the stored encoding so the returned timestamp
        // is exactly what a subsequent read will see.
        let sent_at: DateTime<Utc> =
            DateTime::parse_from_rfc3339(&sent_at_raw)?.with_timezone(&Utc);

        let (body, file_bytes, file_name, mime_type) = match &message.body {
            MessageBody::Text(text) => (Some(text.as_str()), None, None, None),
            MessageBody::Binary {
                bytes,
                file_name,
                mime_type,
            } => (
                None,
                Some(bytes.as_slice()),
                Some(file_name.as_str()),
                Some(mime_type.as_str()),
            ),
        };

        self.conn().execute(
            "INSERT INTO messages (sender_id, receiver_id, kind, body, file_bytes, file_name, mime_type, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.sender_id.0,
                message.receiver_id.map(|r| r.0),
                message.body.kind().as_str(),
                body,
                file_bytes,
                file_name,
                mime_type,
                sent_at_raw,
            ],
        )?;

        let id = self.conn().last_insert_rowid();
        tracing::debug!(id, sender = %message.sender_id, "message persisted");

        Ok(StoredMessage {
            id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            body: message.body.clone(),
            sent_at,
        })
    }

    /// All messages exchanged between the unordered pair `{a, b}`, ordered
    /// by `sent_at` ascending with ties broken by `id`.
    ///
    /// Symmetric: `history(a, b)` and `history(b, a)` return the same
    /// sequence. Side-effect-free and restartable.
    pub fn history(&self, a: UserId, b: UserId) -> Result<Vec<StoredMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender_id, receiver_id, kind, body, file_bytes, file_name, mime_type, sent_at
             FROM messages
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)
             ORDER BY sent_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![a.0, b.0], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let id: i64 = row.get(0)?;
    let sender_id: i64 = row.get(1)?;
    let receiver_id: Option<i64> = row.get(2)?;
    let kind_str: String = row.get(3)?;
    let body_text: Option<String> = row.get(4)?;
    let file_bytes: Option<Vec<u8>> = row.get(5)?;
    let file_name: Option<String> = row.get(6)?;
    let mime_type: Option<String> = row.get(7)?;
    let ts_str: String = row.get(8)?;

    let kind = MessageKind::from_str(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown message kind: {kind_str}").into(),
        )
    })?;

    let body = match kind {
        MessageKind::Text => MessageBody::Text(body_text.unwrap_or_default()),
        MessageKind::Image | MessageKind::File => MessageBody::Binary {
            bytes: file_bytes.unwrap_or_default(),
            file_name: file_name.unwrap_or_default(),
            mime_type: mime_type.unwrap_or_default(),
        },
    };

    let sent_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(StoredMessage {
        id,
        sender_id: UserId(sender_id),
        receiver_id: receiver_id.map(UserId),
        body,
        sent_at,
    })
}
