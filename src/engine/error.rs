use thiserror::Error;
use ulid::Ulid;

use crate::model::{BookingStatus, BookingSummary};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("unknown hall: {0}")]
    UnknownHall(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("time slot is not available: conflicts with {} booking(s)", .0.len())]
    Conflict(Vec<BookingSummary>),
    #[error("booking not found: {0}")]
    NotFound(Ulid),
    #[error("booking {id} was already decided: {current}")]
    InvalidTransition { id: Ulid, current: BookingStatus },
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("WAL error: {0}")]
    WalError(String),
}

impl EngineError {
    /// Caller mistakes that must not be retried as-is.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::MissingFields(_)
                | EngineError::UnknownHall(_)
                | EngineError::LimitExceeded(_)
        )
    }
}
