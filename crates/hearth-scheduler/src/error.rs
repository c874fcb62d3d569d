use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("job not found: {id}")]
    JobNotFound { id: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

impl From<SchedulerError> for hearth_core::KernelError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::JobNotFound { id } => hearth_core::KernelError::NotFound(id),
            SchedulerError::InvalidSchedule(msg) => hearth_core::KernelError::InvalidInput(msg),
            SchedulerError::Database(err) => hearth_core::KernelError::Internal(err.to_string()),
        }
    }
}
