//! Job status and the session state machine.

use serde::{Deserialize, Serialize};

/// Client-side status of an analysis job.
///
/// Transitions only move forward
/// (`Idle → Uploading → Processing → {Complete, Stopped, Failed}`);
/// the single way back is an explicit reset to [`JobStatus::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No job; a file may be staged
    #[default]
    Idle,
    /// The staged file is being submitted to the engine
    Uploading,
    /// The engine accepted the job and results are being polled
    Processing,
    /// The engine reported completion
    Complete,
    /// The user (or teardown) stopped the job
    Stopped,
    /// The job could not be started or polling gave up
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Stopped => "stopped",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Stopped | JobStatus::Failed)
    }

    /// Check if a job is in flight (uploading or being polled).
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Uploading | JobStatus::Processing)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        match (self, next) {
            (Idle, Uploading) => true,
            (Uploading, Processing | Failed | Stopped) => true,
            (Processing, Complete | Stopped | Failed) => true,
            // Explicit reset
            (_, Idle) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Idle.can_transition_to(JobStatus::Uploading));
        assert!(JobStatus::Uploading.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Uploading.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Complete));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Stopped));
    }

    #[test]
    fn test_idle_never_skips_to_complete() {
        assert!(!JobStatus::Idle.can_transition_to(JobStatus::Complete));
        assert!(!JobStatus::Idle.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Uploading.can_transition_to(JobStatus::Complete));
    }

    #[test]
    fn test_terminal_states_only_reset() {
        for status in [JobStatus::Complete, JobStatus::Stopped, JobStatus::Failed] {
            assert!(status.is_terminal());
            assert!(status.can_transition_to(JobStatus::Idle));
            assert!(!status.can_transition_to(JobStatus::Processing));
            assert!(!status.can_transition_to(JobStatus::Uploading));
        }
    }

    #[test]
    fn test_active_states() {
        assert!(JobStatus::Uploading.is_active());
        assert!(JobStatus::Processing.is_active());
        assert!(!JobStatus::Idle.is_active());
        assert!(!JobStatus::Complete.is_active());
    }
}
