//! Client error types.

use thiserror::Error;

use sentinel_models::{JobStatus, ModelError};

pub type EngineResult<T> = Result<T, EngineError>;
pub type SessionResult<T> = Result<T, SessionError>;
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors talking to the analysis engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response carrying a structured `{error}` body
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Non-2xx response without a structured body
    #[error("Engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid engine URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Network(_) => true,
            EngineError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status of the failed response, if the engine answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Rejected { status, .. } | EngineError::Status { status, .. } => Some(*status),
            EngineError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Errors surfaced by a job session.
///
/// Remote failures never escape a session as panics; they become one of
/// these variants and are mirrored on the session snapshot.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Local check failed before any network call
    #[error("{0}")]
    Validation(String),

    /// The engine could not be reached or refused the upload
    #[error("Failed to start analysis: {0}")]
    Transport(String),

    /// The engine rejected the job with its own message
    #[error("{0}")]
    RemoteRejection(String),

    /// A single poll failed
    #[error("Failed to fetch analysis data: {0}")]
    TransientPoll(String),

    /// Polling gave up after too many consecutive failures
    #[error("Lost contact with the analysis engine after {failures} failed polls: {last_error}")]
    PollingAbandoned { failures: u32, last_error: String },

    #[error("Cannot {operation} while the job is {status}")]
    InvalidState {
        operation: &'static str,
        status: JobStatus,
    },

    /// The session was reset or torn down while a call was in flight
    #[error("Session was reset before the job started")]
    Superseded,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_state(operation: &'static str, status: JobStatus) -> Self {
        Self::InvalidState { operation, status }
    }

    /// Classify a failed start request.
    ///
    /// Structured rejections keep the engine's message verbatim; everything
    /// else is a transport failure.
    pub fn from_start_failure(err: EngineError) -> Self {
        match err {
            EngineError::Rejected { message, .. } => Self::RemoteRejection(message),
            other => Self::Transport(other.to_string()),
        }
    }

    /// Check if the error was caught locally without touching the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::Validation(_))
    }
}

/// Errors delivering a completion notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification permission not granted")]
    PermissionDenied,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
