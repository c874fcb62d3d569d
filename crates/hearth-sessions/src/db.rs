use rusqlite::Connection;

use crate::error::Result;

/// Initialise sessions, messages, attachments, and preferences tables.
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout. WAL mode
/// is enabled here so a commit is durable before the call returns, matching
/// the store's durability contract (§4.1).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id     TEXT PRIMARY KEY,
            title          TEXT,
            emoji          TEXT,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL,
            preview        TEXT,
            message_count  INTEGER NOT NULL DEFAULT 0,
            provider       TEXT,
            model          TEXT,
            is_voice       INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_updated
            ON sessions(updated_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            message_id     TEXT PRIMARY KEY,
            session_id     TEXT NOT NULL REFERENCES sessions(session_id),
            role           TEXT NOT NULL,
            content        TEXT NOT NULL,
            timestamp      TEXT NOT NULL,
            status         TEXT NOT NULL,
            error_message  TEXT,
            metadata_json  TEXT NOT NULL DEFAULT '{}',
            seq            INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_id, seq ASC);

        CREATE TABLE IF NOT EXISTS attachments (
            file_id        TEXT PRIMARY KEY,
            message_id     TEXT NOT NULL REFERENCES messages(message_id),
            filename       TEXT NOT NULL,
            mime_type      TEXT NOT NULL,
            size           INTEGER NOT NULL,
            content_base64 TEXT NOT NULL,
            is_image       INTEGER NOT NULL,
            data_url       TEXT,
            thumbnail_base64 TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_attachments_message
            ON attachments(message_id);

        CREATE TABLE IF NOT EXISTS preferences (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}
