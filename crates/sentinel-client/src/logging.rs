//! Structured session logging.
//!
//! Every lifecycle event of a job session is logged with the session ID and
//! feature attached, so interleaved sessions can be told apart.

use sentinel_models::Feature;
use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Session logger with consistent structured fields.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    feature: Feature,
}

impl SessionLogger {
    pub fn new(session_id: Uuid, feature: Feature) -> Self {
        Self {
            session_id: session_id.to_string(),
            feature,
        }
    }

    /// Log the start of a job.
    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            feature = %self.feature.as_str(),
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            feature = %self.feature.as_str(),
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            feature = %self.feature.as_str(),
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            feature = %self.feature.as_str(),
            "Job error: {}", message
        );
    }

    /// Log a terminal transition (complete, stopped).
    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            feature = %self.feature.as_str(),
            "Job finished: {}", message
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    /// Create a tracing span for this session.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "session",
            session_id = %self.session_id,
            feature = %self.feature.as_str()
        )
    }
}
