//! Read-only session snapshots.
//!
//! A snapshot is what the presentation layer sees of a job: status,
//! advisory progress, last error and the accumulated result. Every change
//! bumps `seq` so subscribers can tell fresh snapshots from stale ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feature::Feature;
use crate::job_status::JobStatus;
use crate::summary::ResultSummary;

/// Point-in-time view of a job session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Session identifier (stable for the session's lifetime)
    pub session_id: Uuid,
    /// Feature this session analyses
    pub feature: Feature,
    /// Current job status
    pub status: JobStatus,
    /// Advisory progress (0-100), not reported by the engine
    pub progress_hint: u8,
    /// Last error message, if any
    pub error: Option<String>,
    /// Accumulated result
    pub summary: ResultSummary,
    /// File name of the staged upload
    pub staged_file: Option<String>,
    /// Preview reference of the staged upload
    pub preview: Option<String>,
    /// When the snapshot last changed
    pub updated_at: DateTime<Utc>,
    /// Sequence number (monotonically increasing)
    pub seq: u64,
}

impl JobSnapshot {
    /// Create an idle snapshot for a new session.
    pub fn new(session_id: Uuid, feature: Feature) -> Self {
        Self {
            session_id,
            feature,
            status: JobStatus::Idle,
            progress_hint: 0,
            error: None,
            summary: ResultSummary::empty(feature),
            staged_file: None,
            preview: None,
            updated_at: Utc::now(),
            seq: 0,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a change and bump the sequence number.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.seq += 1;
    }

    /// Update the status.
    ///
    /// Debug builds panic on a move the state machine does not allow.
    pub fn set_status(&mut self, status: JobStatus) {
        self.transition(status);
        self.touch();
    }

    fn transition(&mut self, next: JobStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal job transition {} -> {}",
            self.status,
            next
        );
        self.status = next;
    }

    /// Advance the advisory progress, capped below 100 until completion.
    pub fn bump_progress(&mut self) {
        if self.progress_hint < 90 {
            self.progress_hint += 1;
        }
        self.touch();
    }

    /// Mark the job as completed.
    pub fn complete(&mut self) {
        self.transition(JobStatus::Complete);
        self.progress_hint = 100;
        self.touch();
    }

    /// Mark the job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.transition(JobStatus::Failed);
        self.error = Some(error.into());
        self.touch();
    }

    /// Return to idle, discarding results but keeping the identity.
    pub fn reset(&mut self) {
        self.status = JobStatus::Idle;
        self.progress_hint = 0;
        self.error = None;
        self.summary = ResultSummary::empty(self.feature);
        self.staged_file = None;
        self.preview = None;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_creation() {
        let snapshot = JobSnapshot::new(Uuid::new_v4(), Feature::Mask);
        assert_eq!(snapshot.status, JobStatus::Idle);
        assert_eq!(snapshot.progress_hint, 0);
        assert_eq!(snapshot.seq, 0);
        assert!(!snapshot.is_terminal());
    }

    #[test]
    fn test_progress_caps_until_complete() {
        let mut snapshot = JobSnapshot::new(Uuid::new_v4(), Feature::Plate);
        for _ in 0..200 {
            snapshot.bump_progress();
        }
        assert_eq!(snapshot.progress_hint, 90);

        snapshot.set_status(JobStatus::Uploading);
        snapshot.set_status(JobStatus::Processing);
        snapshot.complete();
        assert_eq!(snapshot.progress_hint, 100);
        assert!(snapshot.is_terminal());
    }

    #[test]
    fn test_fail_and_reset() {
        let mut snapshot = JobSnapshot::new(Uuid::new_v4(), Feature::PeopleCount);
        snapshot.staged_file = Some("clip.mp4".into());
        snapshot.set_status(JobStatus::Uploading);
        snapshot.fail("engine unreachable");
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("engine unreachable"));

        let seq = snapshot.seq;
        snapshot.reset();
        assert_eq!(snapshot.status, JobStatus::Idle);
        assert!(snapshot.error.is_none());
        assert!(snapshot.staged_file.is_none());
        assert!(snapshot.seq > seq);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "illegal job transition")]
    fn test_idle_cannot_complete() {
        let mut snapshot = JobSnapshot::new(Uuid::new_v4(), Feature::Mask);
        snapshot.complete();
    }
}
