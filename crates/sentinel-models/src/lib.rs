//! Shared data models for the Sentinel analysis client.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis features and their engine endpoints
//! - Job status and the session state machine
//! - Poll payloads returned by the analysis engine
//! - Result summaries and session snapshots
//! - Frame and plate image encoding

pub mod error;
pub mod feature;
pub mod image;
pub mod job_status;
pub mod sample;
pub mod snapshot;
pub mod summary;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use feature::Feature;
pub use job_status::JobStatus;
pub use sample::{CountSample, MaskPerson, MaskSample, PlateDetection, PlateSample, PollSample};
pub use snapshot::JobSnapshot;
pub use summary::{CountSummary, MaskSummary, PlateEntry, PlateSummary, ResultSummary};
