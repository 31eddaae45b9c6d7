//! Store error types

use std::path::PathBuf;

/// Errors that can occur while reading or writing stats files
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid challenge id: {0:?}")]
    InvalidChallenge(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed stats file {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize stats: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
