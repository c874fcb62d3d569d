use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("unauthenticated")]
    Unauthenticated,
}

impl From<ProtocolError> for hearth_core::KernelError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::MalformedFrame(m) => hearth_core::KernelError::InvalidInput(m),
            ProtocolError::UnknownMethod(m) => {
                hearth_core::KernelError::NotFound(format!("method: {m}"))
            }
            ProtocolError::Unauthenticated => {
                hearth_core::KernelError::InvalidInput("unauthenticated".to_string())
            }
        }
    }
}
