use std::sync::{Arc, Mutex, RwLock};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;

use crate::error::{Result, SessionError};
use crate::types::{
    Message, MessageMetadata, MessagePatch, Preferences, Session, SessionSummary,
};
use hearth_core::{new_id, MessageStatus};

/// Thread-safe store for sessions, messages, and attachments. Wraps a single
/// SQLite connection in a `Mutex` — sufficient for a single-process
/// installation; a connection pool would only matter at a concurrency scale
/// this kernel doesn't target.
pub struct SessionStore {
    db: Mutex<Connection>,
}

impl SessionStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    #[instrument(skip(self))]
    pub fn create_session(&self, title: Option<String>) -> Result<Session> {
        let id = new_id();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO sessions (session_id, title, created_at, updated_at, is_voice)
             VALUES (?1, ?2, ?3, ?3, 0)",
            params![id, title, now],
        )?;
        Ok(Session {
            session_id: id,
            title,
            emoji: None,
            created_at: now.clone(),
            updated_at: now,
            preview: None,
            message_count: 0,
            provider: None,
            model: None,
            is_voice: false,
        })
    }

    /// Fetch `session_id`, creating it with that exact id if it doesn't
    /// exist yet. Used by the scheduler, which needs a stable
    /// `scheduler:{job_id}` session across every firing rather than a fresh
    /// id each time `create_session` would hand out.
    #[instrument(skip(self))]
    pub fn get_or_create_session(&self, session_id: &str, title: Option<String>) -> Result<Session> {
        match self.get_session(session_id) {
            Ok(session) => Ok(session),
            Err(SessionError::NotFound { .. }) => {
                let now = chrono::Utc::now().to_rfc3339();
                let db = self.db.lock().unwrap();
                db.execute(
                    "INSERT INTO sessions (session_id, title, created_at, updated_at, is_voice)
                     VALUES (?1, ?2, ?3, ?3, 0)",
                    params![session_id, title, now],
                )?;
                Ok(Session {
                    session_id: session_id.to_string(),
                    title,
                    emoji: None,
                    created_at: now.clone(),
                    updated_at: now,
                    preview: None,
                    message_count: 0,
                    provider: None,
                    model: None,
                    is_voice: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub fn get_session(&self, session_id: &str) -> Result<Session> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT session_id, title, emoji, created_at, updated_at, preview,
                    message_count, provider, model, is_voice
             FROM sessions WHERE session_id = ?1",
            params![session_id],
            row_to_session,
        )
        .optional()?
        .ok_or_else(|| SessionError::NotFound {
            id: session_id.to_string(),
        })
    }

    /// Set a session's title, e.g. from best-effort post-turn summarization.
    /// A no-op success if the session doesn't exist would hide bugs, so a
    /// missing id still surfaces as `NotFound`.
    #[instrument(skip(self))]
    pub fn set_session_title(&self, session_id: &str, title: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let rows = db.execute(
            "UPDATE sessions SET title = ?1, updated_at = ?2 WHERE session_id = ?3",
            params![title, now, session_id],
        )?;
        if rows == 0 {
            return Err(SessionError::NotFound {
                id: session_id.to_string(),
            });
        }
        Ok(())
    }

    /// Set a session's emoji, e.g. from an on-demand `sessions/generate_emoji` call.
    #[instrument(skip(self))]
    pub fn set_session_emoji(&self, session_id: &str, emoji: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let rows = db.execute(
            "UPDATE sessions SET emoji = ?1, updated_at = ?2 WHERE session_id = ?3",
            params![emoji, now, session_id],
        )?;
        if rows == 0 {
            return Err(SessionError::NotFound {
                id: session_id.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT session_id, title, emoji, created_at, updated_at, preview,
                    message_count, provider, model, is_voice
             FROM sessions ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(SessionSummary::from(row?));
        }
        Ok(out)
    }

    /// Append a message, assigning it the next `seq` in the session so the
    /// persisted order equals insertion order (I2).
    #[instrument(skip(self, msg))]
    pub fn append_message(&self, msg: &Message) -> Result<()> {
        let db = self.db.lock().unwrap();
        let next_seq: i64 = db.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM messages WHERE session_id = ?1",
            params![msg.session_id],
            |r| r.get(0),
        )?;
        let metadata_json = serde_json::to_string(&msg.metadata)
            .map_err(|e| SessionError::IoError(e.to_string()))?;
        db.execute(
            "INSERT INTO messages
             (message_id, session_id, role, content, timestamp, status, error_message, metadata_json, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                msg.message_id,
                msg.session_id,
                msg.role.to_string(),
                msg.content,
                msg.timestamp,
                msg.status.to_string(),
                msg.error_message,
                metadata_json,
                next_seq,
            ],
        )?;
        for att in &msg.attachments {
            db.execute(
                "INSERT INTO attachments
                 (file_id, message_id, filename, mime_type, size, content_base64, is_image, data_url, thumbnail_base64)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    att.file_id,
                    att.message_id,
                    att.filename,
                    att.mime_type,
                    att.size as i64,
                    att.content_base64,
                    att.is_image as i32,
                    att.data_url,
                    att.thumbnail_base64,
                ],
            )?;
        }
        let preview: String = msg.content.chars().take(120).collect();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "UPDATE sessions SET message_count = message_count + 1, preview = ?1, updated_at = ?2
             WHERE session_id = ?3",
            params![preview, now, msg.session_id],
        )?;
        Ok(())
    }

    /// Apply a narrow patch to an existing message: append streamed content,
    /// advance status forward, merge metadata. Illegal status transitions
    /// fail with `Conflict` rather than silently clamping.
    #[instrument(skip(self, patch))]
    pub fn update_message(&self, message_id: &str, patch: MessagePatch) -> Result<()> {
        let db = self.db.lock().unwrap();
        let (current_content, current_status_str): (String, String) = db
            .query_row(
                "SELECT content, status FROM messages WHERE message_id = ?1",
                params![message_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| SessionError::MessageNotFound {
                id: message_id.to_string(),
            })?;
        let current_status: MessageStatus = current_status_str
            .parse()
            .unwrap_or(MessageStatus::Pending);

        let mut new_content = current_content;
        if let Some(append) = &patch.append_content {
            new_content.push_str(append);
        }

        let new_status = if let Some(next) = patch.new_status {
            if !current_status.can_transition_to(next) {
                return Err(SessionError::Conflict {
                    from: current_status.to_string(),
                    to: next.to_string(),
                });
            }
            next
        } else {
            current_status
        };

        let metadata_json = if let Some(merge) = patch.merge_metadata {
            let existing_json: String = db.query_row(
                "SELECT metadata_json FROM messages WHERE message_id = ?1",
                params![message_id],
                |r| r.get(0),
            )?;
            let mut existing: MessageMetadata =
                serde_json::from_str(&existing_json).unwrap_or_default();
            if merge.tool_calls.is_some() {
                existing.tool_calls = merge.tool_calls;
            }
            if merge.tool_call_id.is_some() {
                existing.tool_call_id = merge.tool_call_id;
            }
            if merge.token_usage.is_some() {
                existing.token_usage = merge.token_usage;
            }
            if merge.automation.is_some() {
                existing.automation = merge.automation;
            }
            if merge.dashboard.is_some() {
                existing.dashboard = merge.dashboard;
            }
            Some(serde_json::to_string(&existing).map_err(|e| SessionError::IoError(e.to_string()))?)
        } else {
            None
        };

        db.execute(
            "UPDATE messages
             SET content = ?1, status = ?2, error_message = COALESCE(?3, error_message),
                 metadata_json = COALESCE(?4, metadata_json)
             WHERE message_id = ?5",
            params![
                new_content,
                new_status.to_string(),
                patch.error_message,
                metadata_json,
                message_id,
            ],
        )?;
        Ok(())
    }

    /// Delete a session and cascade to its messages and attachments in one
    /// transaction, so a crash mid-delete never leaves orphaned rows (P4).
    #[instrument(skip(self))]
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "DELETE FROM attachments WHERE message_id IN (SELECT message_id FROM messages WHERE session_id = ?1)",
            params![session_id],
        )?;
        tx.execute("DELETE FROM messages WHERE session_id = ?1", params![session_id])?;
        let rows = tx.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
        if rows == 0 {
            return Err(SessionError::NotFound {
                id: session_id.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT message_id, session_id, role, content, timestamp, status, error_message, metadata_json
             FROM messages WHERE session_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_message)?;
        let mut out = Vec::new();
        for row in rows {
            let mut msg = row?;
            let mut astmt = db.prepare(
                "SELECT file_id, message_id, filename, mime_type, size, content_base64, is_image, data_url, thumbnail_base64
                 FROM attachments WHERE message_id = ?1",
            )?;
            let attachments = astmt.query_map(params![msg.message_id], row_to_attachment)?;
            for a in attachments {
                msg.attachments.push(a?);
            }
            out.push(msg);
        }
        Ok(out)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        title: row.get(1)?,
        emoji: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        preview: row.get(5)?,
        message_count: row.get::<_, i64>(6)? as u32,
        provider: row.get(7)?,
        model: row.get(8)?,
        is_voice: row.get::<_, i64>(9)? != 0,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role_str: String = row.get(2)?;
    let status_str: String = row.get(5)?;
    let metadata_json: String = row.get(7)?;
    Ok(Message {
        message_id: row.get(0)?,
        session_id: row.get(1)?,
        role: role_str.parse().unwrap_or(hearth_core::Role::User),
        content: row.get(3)?,
        timestamp: row.get(4)?,
        status: status_str.parse().unwrap_or(MessageStatus::Pending),
        error_message: row.get(6)?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        attachments: Vec::new(),
    })
}

fn row_to_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<crate::types::Attachment> {
    Ok(crate::types::Attachment {
        file_id: row.get(0)?,
        message_id: row.get(1)?,
        filename: row.get(2)?,
        mime_type: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        content_base64: row.get(5)?,
        is_image: row.get::<_, i64>(6)? != 0,
        data_url: row.get(7)?,
        thumbnail_base64: row.get(8)?,
    })
}

/// Copy-on-write preferences: readers take an `Arc` snapshot under a brief
/// read lock, writers build a new `Preferences` and swap the pointer under a
/// brief write lock. No reader ever blocks a writer mid-read.
pub struct PreferencesStore {
    current: RwLock<Arc<Preferences>>,
    db: Mutex<Connection>,
}

impl PreferencesStore {
    pub fn load(conn: Connection) -> Result<Self> {
        let mut prefs = Preferences::default();
        {
            let mut stmt = conn.prepare("SELECT key, value FROM preferences")?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (key, value) = row?;
                apply_preference_field(&mut prefs, &key, &value);
            }
        }
        Ok(Self {
            current: RwLock::new(Arc::new(prefs)),
            db: Mutex::new(conn),
        })
    }

    pub fn snapshot(&self) -> Arc<Preferences> {
        self.current.read().unwrap().clone()
    }

    /// Set a single preference by key. Unknown keys are rejected so typos
    /// in a WS `preferences/set` call surface immediately instead of being
    /// silently dropped.
    pub fn set(&self, key: &str, value: &str) -> Result<Arc<Preferences>> {
        if !crate::types::PREFERENCE_KEYS.contains(&key) {
            return Err(SessionError::IoError(format!("unknown preference key: {key}")));
        }
        {
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO preferences (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        let mut next = (**self.current.read().unwrap()).clone();
        apply_preference_field(&mut next, key, value);
        let arc = Arc::new(next);
        *self.current.write().unwrap() = arc.clone();
        Ok(arc)
    }
}

fn apply_preference_field(prefs: &mut Preferences, key: &str, value: &str) {
    match key {
        "agent_name" => prefs.agent_name = value.to_string(),
        "agent_personality" => prefs.agent_personality = Some(value.to_string()),
        "agent_emoji" => prefs.agent_emoji = Some(value.to_string()),
        "user_name" => prefs.user_name = Some(value.to_string()),
        "user_info" => prefs.user_info = Some(value.to_string()),
        "language" => prefs.language = value.to_string(),
        "onboarding_completed" => prefs.onboarding_completed = value == "true",
        "default_provider" => prefs.default_provider = Some(value.to_string()),
        "default_model" => prefs.default_model = Some(value.to_string()),
        "rag_optimizer_provider" => prefs.rag_optimizer_provider = Some(value.to_string()),
        "rag_optimizer_model" => prefs.rag_optimizer_model = Some(value.to_string()),
        "theme" => prefs.theme = Some(value.to_string()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use hearth_core::Role;

    fn fresh_store() -> SessionStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        SessionStore::new(conn)
    }

    #[test]
    fn create_append_get_round_trips() {
        let store = fresh_store();
        let session = store.create_session(Some("trip planning".to_string())).unwrap();

        let msg = Message {
            message_id: new_id(),
            session_id: session.session_id.clone(),
            role: Role::User,
            content: "where should we go".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: MessageStatus::Completed,
            error_message: None,
            metadata: MessageMetadata::default(),
            attachments: Vec::new(),
        };
        store.append_message(&msg).unwrap();

        let fetched = store.get_session(&session.session_id).unwrap();
        assert_eq!(fetched.message_count, 1);
        let messages = store.list_messages(&session.session_id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "where should we go");
    }

    #[test]
    fn message_order_matches_insertion_order() {
        let store = fresh_store();
        let session = store.create_session(None).unwrap();
        for i in 0..5 {
            let msg = Message {
                message_id: new_id(),
                session_id: session.session_id.clone(),
                role: Role::User,
                content: format!("msg {i}"),
                timestamp: chrono::Utc::now().to_rfc3339(),
                status: MessageStatus::Completed,
                error_message: None,
                metadata: MessageMetadata::default(),
                attachments: Vec::new(),
            };
            store.append_message(&msg).unwrap();
        }
        let messages = store.list_messages(&session.session_id).unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(
            contents,
            vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]
        );
    }

    #[test]
    fn illegal_status_transition_is_rejected() {
        let store = fresh_store();
        let session = store.create_session(None).unwrap();
        let msg = Message {
            message_id: new_id(),
            session_id: session.session_id.clone(),
            role: Role::Assistant,
            content: String::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: MessageStatus::Completed,
            error_message: None,
            metadata: MessageMetadata::default(),
            attachments: Vec::new(),
        };
        store.append_message(&msg).unwrap();
        let patch = MessagePatch {
            new_status: Some(MessageStatus::Streaming),
            ..Default::default()
        };
        let result = store.update_message(&msg.message_id, patch);
        assert!(matches!(result, Err(SessionError::Conflict { .. })));
    }

    #[test]
    fn delete_session_cascades_to_messages_and_attachments() {
        let store = fresh_store();
        let session = store.create_session(None).unwrap();
        let msg = Message {
            message_id: new_id(),
            session_id: session.session_id.clone(),
            role: Role::User,
            content: "hi".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: MessageStatus::Completed,
            error_message: None,
            metadata: MessageMetadata::default(),
            attachments: vec![crate::types::Attachment {
                file_id: new_id(),
                message_id: String::new(),
                filename: "a.png".to_string(),
                mime_type: "image/png".to_string(),
                size: 10,
                content_base64: "AAAA".to_string(),
                is_image: true,
                data_url: None,
                thumbnail_base64: None,
            }],
        };
        store.append_message(&msg).unwrap();
        store.delete_session(&session.session_id).unwrap();
        assert!(matches!(
            store.get_session(&session.session_id),
            Err(SessionError::NotFound { .. })
        ));
    }

    #[test]
    fn set_session_title_updates_existing_session() {
        let store = fresh_store();
        let session = store.create_session(None).unwrap();
        store.set_session_title(&session.session_id, "trip planning").unwrap();
        let fetched = store.get_session(&session.session_id).unwrap();
        assert_eq!(fetched.title.as_deref(), Some("trip planning"));
    }

    #[test]
    fn set_session_title_on_missing_session_is_not_found() {
        let store = fresh_store();
        let result = store.set_session_title("no-such-session", "x");
        assert!(matches!(result, Err(SessionError::NotFound { .. })));
    }

    #[test]
    fn set_session_emoji_updates_existing_session() {
        let store = fresh_store();
        let session = store.create_session(None).unwrap();
        store.set_session_emoji(&session.session_id, "\u{2708}\u{fe0f}").unwrap();
        let fetched = store.get_session(&session.session_id).unwrap();
        assert_eq!(fetched.emoji.as_deref(), Some("\u{2708}\u{fe0f}"));
    }

    #[test]
    fn set_session_emoji_on_missing_session_is_not_found() {
        let store = fresh_store();
        let result = store.set_session_emoji("no-such-session", "\u{1f3e0}");
        assert!(matches!(result, Err(SessionError::NotFound { .. })));
    }

    #[test]
    fn preferences_set_rejects_unknown_key() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let prefs = PreferencesStore::load(conn).unwrap();
        assert!(prefs.set("not_a_real_key", "x").is_err());
        assert!(prefs.set("agent_name", "Hearth Prime").is_ok());
        assert_eq!(prefs.snapshot().agent_name, "Hearth Prime");
    }
}
