//! Error types for mammoth-client.
//!
//! The taxonomy separates three kinds of outcome a caller has to tell apart:
//! the outcome is unknown (`TransportFailure`, `JobTimeout`), the service
//! reported a failure (`RequestFailure`, `JobFailed`), or the credentials
//! were rejected (`AuthenticationFailure`).

use crate::models::JobId;
use std::time::Duration;
use thiserror::Error;

/// Result type for mammoth-client operations
pub type Result<T> = std::result::Result<T, MammothError>;

/// Network-level failure categories reported by a [`crate::Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established or was reset
    Connect,
    /// The request did not complete within the transport timeout
    Timeout,
    /// Request construction or body handling failed
    Other,
}

impl TransportErrorKind {
    /// Whether the Retry Layer may attempt the request again
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Connect | Self::Timeout)
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connection error"),
            Self::Timeout => write!(f, "request timeout"),
            Self::Other => write!(f, "request error"),
        }
    }
}

/// Errors surfaced by the client.
#[derive(Error, Debug, Clone)]
pub enum MammothError {
    #[error("Transport failure ({kind}): {message}")]
    TransportFailure {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("API request failed ({status_code}): {message}")]
    RequestFailure {
        status_code: u16,
        message: String,
        /// Raw response body, kept for diagnostics
        body: String,
    },

    #[error("Job {job_id} timed out after {} seconds", .timeout.as_secs())]
    JobTimeout { job_id: JobId, timeout: Duration },

    #[error("Job {job_id} failed{}", .reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default())]
    JobFailed {
        job_id: JobId,
        reason: Option<String>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    /// A deadline-bound call ran out of time before a request could be issued.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MammothError {
    pub(crate) fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            kind,
            message: message.into(),
        }
    }

    /// Whether the Retry Layer treats this error as transient.
    ///
    /// Network failures (connect/timeout) and server errors (status >= 500)
    /// are retryable; authentication and other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransportFailure { kind, .. } => kind.is_retryable(),
            Self::RequestFailure { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// True when the client gave up waiting; the job may still finish server-side.
    pub fn is_job_timeout(&self) -> bool {
        matches!(self, Self::JobTimeout { .. })
    }

    /// The job this error refers to, if any
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::JobTimeout { job_id, .. } | Self::JobFailed { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// HTTP status code carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RequestFailure { status_code, .. } => Some(*status_code),
            Self::AuthenticationFailure(_) => Some(401),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MammothError {
    fn from(err: serde_json::Error) -> Self {
        MammothError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for MammothError {
    fn from(err: std::io::Error) -> Self {
        MammothError::InvalidInput(err.to_string())
    }
}
