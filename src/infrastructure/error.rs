use crate::domain::temporal::TemporalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid event record: {0}")]
    InvalidRecord(String),
    #[error(transparent)]
    Temporal(#[from] TemporalError),
    #[error("Network error: {0}")]
    Network(String),
    #[error("calendar store error: http {status}; body={body}")]
    Http { status: u16, body: String },
}

impl InfraError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
