//! v001 -- Initial schema creation.
//!
//! Creates the append-only `messages` table. `id` is the rowid with
//! AUTOINCREMENT, so assigned ids are unique and strictly increasing for
//! the lifetime of the store.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id   INTEGER NOT NULL,
    receiver_id INTEGER,                 -- nullable, reserved for group chat
    kind        TEXT NOT NULL,           -- text | image | file
    body        TEXT,                    -- text content (kind = text)
    file_bytes  BLOB,                    -- attachment bytes (kind = image/file)
    file_name   TEXT,                    -- original file name
    mime_type   TEXT,                    -- attachment media type
    sent_at     TEXT NOT NULL            -- RFC-3339 UTC, fixed width
);

-- Secondary lookup by conversation pair, both directions.
CREATE INDEX IF NOT EXISTS idx_messages_pair
    ON messages(sender_id, receiver_id, sent_at);
CREATE INDEX IF NOT EXISTS idx_messages_pair_rev
    ON messages(receiver_id, sender_id, sent_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
