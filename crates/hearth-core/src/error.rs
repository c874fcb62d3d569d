use thiserror::Error;

/// Kernel-wide error. Subsystem crates define their own error enums; this
/// is the union used at the orchestrator boundary and for the WS error
/// envelope, following the same per-crate-then-union split the teacher uses
/// (`SkynetError` alongside `SessionError`/`MemoryError`/`SchedulerError`).
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("provider error (retryable={retryable}): {message}")]
    Provider { retryable: bool, message: String },

    #[error("tool error: {0}")]
    Tool(String),

    #[error("embedding error: {0}")]
    Embed(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("cancelled")]
    Cancelled,

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl KernelError {
    /// Short machine-readable code for the WS error envelope (spec §7 Kind column).
    pub fn code(&self) -> &'static str {
        match self {
            KernelError::NotFound(_) => "NOT_FOUND",
            KernelError::Conflict(_) => "CONFLICT",
            KernelError::Provider { retryable: true, .. } => "PROVIDER_ERROR_RETRYABLE",
            KernelError::Provider { retryable: false, .. } => "PROVIDER_ERROR",
            KernelError::Tool(_) => "TOOL_ERROR",
            KernelError::Embed(_) => "EMBED_ERROR",
            KernelError::Timeout(_) => "TIMEOUT",
            KernelError::Cancelled => "CANCELLED",
            KernelError::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            KernelError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            KernelError::InvalidInput(_) => "INVALID_INPUT",
            KernelError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
