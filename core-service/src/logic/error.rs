//! Error types for the proctoring pipeline

use thiserror::Error;

pub type ProctorResult<T> = Result<T, ProctorError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProctorError {
    // Caller / input errors
    #[error("missing required session identity: {0}")]
    MissingIdentity(&'static str),

    #[error("end time {end} is before start time {start}")]
    InvalidTimeRange { start: String, end: String },

    #[error("unknown violation type '{0}'")]
    UnknownViolationType(String),

    // Fatal to the session
    #[error("detection source unavailable: {0}")]
    DetectionUnavailable(String),

    // Session registry errors
    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} is closed")]
    SessionClosed(String),

    // Infrastructure errors (recoverable)
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl ProctorError {
    /// Caller errors are rejected at the boundary, never retried
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentity(_) | Self::InvalidTimeRange { .. } | Self::UnknownViolationType(_)
        )
    }
}
