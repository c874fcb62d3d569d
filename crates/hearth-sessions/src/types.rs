use hearth_core::{MessageStatus, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted conversation session.
///
/// Created on first user message (or explicit UI request), mutated after
/// each turn (counters, preview, title), destroyed by explicit delete which
/// cascades to messages, attachments, and session-chunk embeddings owned by
/// the RAG subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub title: Option<String>,
    pub emoji: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub preview: Option<String>,
    pub message_count: u32,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub is_voice: bool,
}

/// Lightweight summary for list views — avoids shipping full message text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: Option<String>,
    pub emoji: Option<String>,
    pub updated_at: String,
    pub preview: Option<String>,
    pub message_count: u32,
}

impl From<Session> for SessionSummary {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.session_id,
            title: s.title,
            emoji: s.emoji,
            updated_at: s.updated_at,
            preview: s.preview,
            message_count: s.message_count,
        }
    }
}

/// Per-message side channel carrying structured detail a plain-text
/// transcript can't: tool invocations, usage counters, and renderer hints
/// for automation/dashboard payloads. When both `metadata.automation` (or
/// `.dashboard`) and a re-parsed content prefix could describe the same
/// thing, `metadata` is authoritative (see DESIGN.md).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_call_id: String,
    pub name: String,
    pub args_json: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A single message in a session. Append-only: `update_message` may only
/// append streamed content, advance `status` forward, or merge `metadata` —
/// never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    pub status: MessageStatus,
    pub error_message: Option<String>,
    pub metadata: MessageMetadata,
    pub attachments: Vec<Attachment>,
}

/// A file attached to a message. Images within the configured inline limit
/// are base64-embedded directly into the provider request; larger or
/// non-image files are summarized into the message text instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    pub message_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub content_base64: String,
    pub is_image: bool,
    pub data_url: Option<String>,
    pub thumbnail_base64: Option<String>,
}

/// A patch that may be applied to a message by `update_message`.
/// Deliberately narrow — this is the whole legal mutation surface.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub append_content: Option<String>,
    pub new_status: Option<MessageStatus>,
    pub error_message: Option<String>,
    pub merge_metadata: Option<MessageMetadata>,
}

/// Process-wide identity/preferences configuration. Recognized keys mirror
/// the fixed field set below; unknown keys passed over the wire are
/// rejected rather than silently accepted, so typos surface immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub agent_name: String,
    pub agent_personality: Option<String>,
    pub agent_emoji: Option<String>,
    pub user_name: Option<String>,
    pub user_info: Option<String>,
    pub language: String,
    pub onboarding_completed: bool,
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub rag_optimizer_provider: Option<String>,
    pub rag_optimizer_model: Option<String>,
    pub theme: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            agent_name: "Hearth".to_string(),
            agent_personality: None,
            agent_emoji: None,
            user_name: None,
            user_info: None,
            language: "en".to_string(),
            onboarding_completed: false,
            default_provider: None,
            default_model: None,
            rag_optimizer_provider: None,
            rag_optimizer_model: None,
            theme: None,
        }
    }
}

/// Names of the recognized preference keys, used to validate `preferences/set`.
pub const PREFERENCE_KEYS: &[&str] = &[
    "agent_name",
    "agent_personality",
    "agent_emoji",
    "user_name",
    "user_info",
    "language",
    "onboarding_completed",
    "default_provider",
    "default_model",
    "rag_optimizer_provider",
    "rag_optimizer_model",
    "theme",
];
