//! Job lifecycle client for the Sentinel video analysis engine.
//!
//! This crate provides:
//! - An HTTP client for the engine's start/poll/stop endpoints
//! - A cancellable fixed-interval poller
//! - Per-feature result accumulation
//! - Upload staging and validation
//! - Best-effort completion notifications
//! - `JobSession`, the state machine tying it all together

pub mod accumulator;
pub mod config;
pub mod engine;
pub mod error;
pub mod failure;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod poller;
pub mod session;
pub mod upload;

pub use accumulator::ResultAccumulator;
pub use config::ClientConfig;
pub use engine::{AnalysisEngine, HttpEngine};
pub use error::{EngineError, EngineResult, NotifyError, NotifyResult, SessionError, SessionResult};
pub use logging::SessionLogger;
pub use notify::{
    LogSink, NoopSink, Notification, NotificationPermission, NotificationSink, WebhookSink,
};
pub use poller::{PollControl, Poller};
pub use session::{JobSession, SessionOptions};
pub use upload::{MediaSource, StagedFile, UploadCandidate, UploadGate, UploadPayload};

pub use sentinel_models as models;
