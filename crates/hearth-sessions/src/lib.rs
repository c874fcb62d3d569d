pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use db::init_db;
pub use error::SessionError;
pub use manager::{PreferencesStore, SessionStore};
pub use types::{
    Attachment, Message, MessageMetadata, MessagePatch, Preferences, Session, SessionSummary,
    TokenUsage, ToolCallRecord, PREFERENCE_KEYS,
};
