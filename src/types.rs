//! Shared error and result types for sexton

use thiserror::Error;

/// Errors surfaced by sexton components
#[derive(Debug, Error)]
pub enum SextonError {
    /// Configuration problem detected at startup or reload
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings blob could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Request to the content app origin failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Content repository query or insert failed
    #[error("Repository error: {0}")]
    Repository(String),

    /// Client-side validation rejected the payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Platform notification could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),

    /// Playback surface could not be opened
    #[error("Playback error: {0}")]
    Playback(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for sexton operations
pub type Result<T> = std::result::Result<T, SextonError>;

impl From<serde_json::Error> for SextonError {
    fn from(e: serde_json::Error) -> Self {
        SextonError::Internal(format!("JSON error: {}", e))
    }
}

impl From<std::io::Error> for SextonError {
    fn from(e: std::io::Error) -> Self {
        SextonError::Storage(format!("I/O error: {}", e))
    }
}

impl From<reqwest::Error> for SextonError {
    fn from(e: reqwest::Error) -> Self {
        SextonError::Upstream(format!("HTTP error: {}", e))
    }
}
