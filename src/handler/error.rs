//! Handler error types and their status codes

use axum::http::StatusCode;

use crate::store::StoreError;

/// Everything that can end a request early. Each kind maps to one status code
/// and is rendered as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid JSON")]
    Parse,

    #[error("{0}")]
    Storage(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The transport refused the request before it reached the handler
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl StatsError {
    pub fn missing_fields() -> Self {
        Self::Validation("userId and stats required".to_string())
    }

    pub fn body_too_large() -> Self {
        Self::Rejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "Request body too large".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Parse => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Rejected { status, .. } => *status,
        }
    }
}

impl From<StoreError> for StatsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidChallenge(_) => {
                Self::Validation("Invalid challengeDate".to_string())
            }
            other => Self::Storage(other.to_string()),
        }
    }
}
