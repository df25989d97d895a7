//! Session metrics.
//!
//! Recorded through the `metrics` facade; the embedding application decides
//! whether and where to export them.

use metrics::{counter, histogram};
use sentinel_models::{Feature, JobStatus};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "sentinel_jobs_started_total";
    pub const JOBS_FINISHED_TOTAL: &str = "sentinel_jobs_finished_total";
    pub const POLL_FETCH_TOTAL: &str = "sentinel_poll_fetch_total";
    pub const STOP_REQUESTS_TOTAL: &str = "sentinel_stop_requests_total";
    pub const START_DURATION_SECONDS: &str = "sentinel_start_duration_seconds";
}

/// Record a start request and how long the upload took.
pub fn record_job_started(feature: Feature, accepted: bool, duration_secs: f64) {
    let labels = [
        ("feature", feature.as_str().to_string()),
        ("accepted", accepted.to_string()),
    ];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
    histogram!(names::START_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a job reaching a terminal status.
pub fn record_job_finished(feature: Feature, status: JobStatus) {
    let labels = [
        ("feature", feature.as_str().to_string()),
        ("status", status.as_str().to_string()),
    ];
    counter!(names::JOBS_FINISHED_TOTAL, &labels).increment(1);
}

/// Record a single poll fetch.
pub fn record_poll_fetch(feature: Feature, success: bool) {
    let labels = [
        ("feature", feature.as_str().to_string()),
        ("success", success.to_string()),
    ];
    counter!(names::POLL_FETCH_TOTAL, &labels).increment(1);
}

/// Record a best-effort stop request.
pub fn record_stop_request(feature: Feature, success: bool) {
    let labels = [
        ("feature", feature.as_str().to_string()),
        ("success", success.to_string()),
    ];
    counter!(names::STOP_REQUESTS_TOTAL, &labels).increment(1);
}
