use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("embedding error: {0}")]
    EmbedError(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RagError>;

impl From<RagError> for hearth_core::KernelError {
    fn from(e: RagError) -> Self {
        match e {
            RagError::EmbedError(m) => hearth_core::KernelError::Embed(m),
            RagError::SchemaMismatch { expected, actual } => hearth_core::KernelError::SchemaMismatch(
                format!("expected {expected}, got {actual}"),
            ),
            RagError::Database(e) => hearth_core::KernelError::Internal(e.to_string()),
            RagError::NotFound(m) => hearth_core::KernelError::NotFound(m),
        }
    }
}
