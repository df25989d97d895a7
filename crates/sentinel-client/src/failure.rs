//! Consecutive poll failure tracking.
//!
//! A session tolerates a run of failed polls before giving up on a job.
//! The tracker counts the run and throttles the logs it produces.

use tracing::{debug, warn};

/// Failures logged individually before further logs are suppressed.
const MAX_LOGGED_FAILURES: u32 = 3;

/// Counts consecutive failures against a give-up threshold.
#[derive(Debug)]
pub struct FailureTracker {
    consecutive_failures: u32,
    threshold: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    /// Create a tracker that is exhausted after `threshold` failures in a row.
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: threshold.max(1),
            max_logged_failures: MAX_LOGGED_FAILURES,
            suppressed: false,
        }
    }

    /// Record a successful poll (resets the run).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            debug!(
                "Polling recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed poll.
    ///
    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else if !self.suppressed {
            self.suppressed = true;
            warn!(
                "Suppressing further poll failure logs after {} consecutive failures",
                self.max_logged_failures
            );
            false
        } else {
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Whether the run of failures has reached the threshold.
    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }

    /// Forget the current run.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.suppressed = false;
    }
}
