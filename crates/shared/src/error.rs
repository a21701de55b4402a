use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 422 => Self::Validation,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Error reported by the scoring API for a non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code:?} (HTTP {status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: ErrorCode::from_status(status),
            message: message.into(),
        }
    }

    /// Builds an error from a raw response body. The server wraps messages as
    /// `{"detail": ...}`; anything else is kept verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self::new(status, extract_detail(body).unwrap_or_else(|| body.trim().to_string()))
    }
}

fn extract_detail(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct DetailWrap {
        detail: serde_json::Value,
    }

    let wrap = serde_json::from_str::<DetailWrap>(body).ok()?;
    match wrap.detail {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
