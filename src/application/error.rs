use crate::domain::temporal::TemporalError;
use crate::infrastructure::error::InfraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    MalformedTemporalInput(#[from] TemporalError),
    #[error("{operation} failed: {source}")]
    RemoteOperationFailed {
        operation: &'static str,
        #[source]
        source: InfraError,
    },
    #[error("unparseable {operation} response: {message}")]
    UnparseableResponse {
        operation: &'static str,
        message: String,
    },
    #[error("event not found: {0}")]
    EventNotFound(String),
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

impl ReconcileError {
    pub(crate) fn remote(operation: &'static str, source: InfraError) -> Self {
        Self::RemoteOperationFailed { operation, source }
    }

    /// HTTP status of a failed remote call, when the store returned one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteOperationFailed { source, .. } => source.status(),
            _ => None,
        }
    }
}
