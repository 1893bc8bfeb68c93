//! Sync error handling
//!
//! Typed errors for backend calls made by the sync store, with a coarse
//! classification used to decide whether the store should flip to
//! offline, plus recovery suggestions for front ends.

use thiserror::Error;

/// Coarse classification of a [`SyncError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backend could not be reached
    NetworkFailure,
    /// The backend rejected a malformed record
    ValidationFailure,
    /// The addressed record does not exist
    NotFound,
    /// Missing or expired credentials
    Unauthorized,
    /// Any other backend-side failure
    Backend,
    /// The backend answered with something we could not parse
    Decode,
}

/// Errors that can occur talking to the task backend
#[derive(Error, Debug)]
pub enum SyncError {
    /// Request never reached the backend or the connection dropped
    #[error("Network error talking to {url}: {message}")]
    Network { url: String, message: String },

    /// Backend rejected the record (HTTP 400)
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        /// Per-field messages reported by the backend
        fields: Vec<(String, String)>,
    },

    /// Record not found (HTTP 404)
    #[error("Record not found: {id}")]
    NotFound { id: String },

    /// Authentication required or rejected (HTTP 401/403)
    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    /// Any other non-success response
    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    /// The change feed was closed by the backend
    #[error("Change feed closed")]
    FeedClosed,
}

impl SyncError {
    /// Build a network error for the given endpoint
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Build a validation error without per-field details
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Network { .. } | SyncError::FeedClosed => ErrorKind::NetworkFailure,
            SyncError::Validation { .. } => ErrorKind::ValidationFailure,
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::Unauthorized { .. } => ErrorKind::Unauthorized,
            SyncError::Backend { .. } => ErrorKind::Backend,
            SyncError::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Whether the error means the backend is unreachable
    pub fn is_network(&self) -> bool {
        self.kind() == ErrorKind::NetworkFailure
    }

    /// Check if retrying later might succeed without user changes
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Network { .. } | SyncError::FeedClosed => true,
            SyncError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::NetworkFailure => {
                Some("Check your connection and that the backend is running, then sync again.")
            }
            ErrorKind::Unauthorized => Some("Log in again with `taskmaster login <email>`."),
            ErrorKind::ValidationFailure => Some("Fix the highlighted fields and retry."),
            ErrorKind::NotFound => Some("The task may have been deleted elsewhere; sync to refresh."),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        let url = error
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "backend".to_string());

        if error.is_decode() {
            SyncError::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            SyncError::Backend {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            SyncError::network(url, error)
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        SyncError::Decode(error.to_string())
    }
}

/// Result type for backend and sync operations
pub type SyncResult<T> = Result<T, SyncError>;
