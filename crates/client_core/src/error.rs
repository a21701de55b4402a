use shared::{error::ApiError, protocol::PayloadError};
use thiserror::Error;

use crate::session::{Phase, SessionId};

/// Caller invoked an operation whose precondition does not hold. State is
/// left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{operation} is not allowed while {phase}")]
    WrongPhase {
        operation: &'static str,
        phase: Phase,
    },
    #[error("pick an option first")]
    NoSelection,
    #[error("'{choice}' is not one of the current question's choices")]
    UnknownChoice { choice: String },
}

/// Connectivity failure or non-success response from the scoring service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("scoring service rejected request: {0}")]
    Api(#[from] ApiError),
    #[error("scoring service unreachable: {0}")]
    Network(String),
    #[error("invalid response from scoring service: {0}")]
    Decode(String),
    #[error("malformed question set: {0}")]
    MalformedPayload(#[from] PayloadError),
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else if let Some(status) = value.status() {
            Self::Api(ApiError::new(status.as_u16(), value.to_string()))
        } else {
            Self::Network(value.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("response for session {ticket} arrived after the session moved on (live session {live})")]
    StaleResponse { ticket: SessionId, live: SessionId },
}

impl QuizError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
