use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {id}")]
    NotFound { id: String },

    #[error("message not found: {id}")]
    MessageNotFound { id: String },

    #[error("illegal status transition: {from} -> {to}")]
    Conflict { from: String, to: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for hearth_core::KernelError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound { id } => hearth_core::KernelError::NotFound(id),
            SessionError::MessageNotFound { id } => hearth_core::KernelError::NotFound(id),
            SessionError::Conflict { from, to } => {
                hearth_core::KernelError::Conflict(format!("{from} -> {to}"))
            }
            SessionError::Database(e) => hearth_core::KernelError::Internal(e.to_string()),
            SessionError::IoError(m) => hearth_core::KernelError::Internal(m),
        }
    }
}
