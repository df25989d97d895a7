//! Job session state machine.
//!
//! A [`JobSession`] owns one feature's job from file selection to teardown:
//!
//! ```text
//! Idle -> Uploading -> Processing -> { Complete | Stopped | Failed }
//!   ^                                            |
//!   +------------------- reset() ---------------+
//! ```
//!
//! Every state change is published as a [`JobSnapshot`] on a watch channel.
//! Poll results are tagged with the epoch they were started under; a reset
//! or teardown bumps the epoch so results from an older job are dropped
//! instead of applied.
//!
//! Engine calls made by `start` are serialized per session. A start that
//! was superseded by a reset finishes its upload and releases that job
//! before the next start contacts the engine, so a late acceptance can
//! never replace or stop a newer job.
//!
//! Lock order: the poller's delivery gate is taken before the session state.
//! Pollers are therefore never stopped or dropped while the state is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use sentinel_models::{Feature, JobSnapshot, JobStatus, PollSample};
use tokio::sync::watch;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::accumulator::ResultAccumulator;
use crate::config::ClientConfig;
use crate::engine::{AnalysisEngine, HttpEngine};
use crate::error::{EngineError, SessionError, SessionResult};
use crate::failure::FailureTracker;
use crate::logging::SessionLogger;
use crate::metrics;
use crate::notify::{LogSink, Notification, NotificationPermission, NotificationSink, WebhookSink};
use crate::poller::{PollControl, Poller};
use crate::upload::{UploadCandidate, UploadGate};

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    /// Consecutive poll failures before the job is marked failed
    pub failure_threshold: u32,
    pub max_upload_bytes: u64,
}

impl SessionOptions {
    pub fn from_config(config: &ClientConfig, feature: Feature) -> Self {
        Self {
            poll_interval: config.poll_interval(feature),
            failure_threshold: config.poll_failure_threshold,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Defaults for a feature.
    pub fn for_feature(feature: Feature) -> Self {
        Self::from_config(&ClientConfig::default(), feature)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_failure_threshold(mut self, failure_threshold: u32) -> Self {
        self.failure_threshold = failure_threshold;
        self
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.poll_interval.is_zero() {
            return Err(SessionError::config("poll interval must be greater than zero"));
        }
        if self.failure_threshold == 0 {
            return Err(SessionError::config("poll failure threshold must be at least 1"));
        }
        if self.max_upload_bytes == 0 {
            return Err(SessionError::config("upload size limit must be greater than zero"));
        }
        Ok(())
    }
}

struct SessionState {
    snapshot: JobSnapshot,
    gate: UploadGate,
    poller: Option<Poller>,
    epoch: u64,
    failures: FailureTracker,
    torn_down: bool,
}

enum StartOutcome {
    Superseded { accepted: bool },
    Failed(SessionError),
    /// Carries any poller that was replaced, to be dropped unlocked
    Started(Option<Poller>),
}

struct SessionShared {
    id: Uuid,
    feature: Feature,
    engine: Arc<dyn AnalysisEngine>,
    notifier: Arc<dyn NotificationSink>,
    options: SessionOptions,
    accumulator: ResultAccumulator,
    logger: SessionLogger,
    state: Mutex<SessionState>,
    /// Held by `start` from its first engine call to its last
    engine_turn: tokio::sync::Mutex<()>,
    snapshot_tx: watch::Sender<JobSnapshot>,
}

/// One feature's job lifecycle.
///
/// Dropping the session tears it down: polling stops immediately and, if a
/// job was running, a best-effort stop is sent to the engine on the current
/// Tokio runtime. Use [`JobSession::shutdown`] to wait for that request.
pub struct JobSession {
    shared: Arc<SessionShared>,
}

impl JobSession {
    /// Create an idle session.
    ///
    /// Notification permission is requested here unless the user already
    /// denied it.
    pub fn new(
        feature: Feature,
        engine: Arc<dyn AnalysisEngine>,
        notifier: Arc<dyn NotificationSink>,
        options: SessionOptions,
    ) -> Self {
        let id = Uuid::new_v4();
        let logger = SessionLogger::new(id, feature);

        if notifier.permission() != NotificationPermission::Denied {
            let permission = notifier.request_permission();
            debug!("Notification permission for session {}: {:?}", id, permission);
        }

        let snapshot = JobSnapshot::new(id, feature);
        let (snapshot_tx, _) = watch::channel(snapshot.clone());

        let state = SessionState {
            snapshot,
            gate: UploadGate::new(options.max_upload_bytes),
            poller: None,
            epoch: 0,
            failures: FailureTracker::new(options.failure_threshold),
            torn_down: false,
        };

        Self {
            shared: Arc::new(SessionShared {
                id,
                feature,
                engine,
                notifier,
                accumulator: ResultAccumulator::new(feature),
                options,
                logger,
                state: Mutex::new(state),
                engine_turn: tokio::sync::Mutex::new(()),
                snapshot_tx,
            }),
        }
    }

    /// Create a session talking HTTP to the configured engine.
    ///
    /// Completion notifications go to the configured webhook, or to the log
    /// when none is set.
    pub fn connect(feature: Feature, config: &ClientConfig) -> SessionResult<Self> {
        config.validate()?;

        let engine = HttpEngine::new(config)
            .map_err(|e| SessionError::config(format!("failed to build engine client: {}", e)))?;

        let notifier: Arc<dyn NotificationSink> = match &config.notify_webhook {
            Some(url) => Arc::new(
                WebhookSink::new(url.clone())
                    .map_err(|e| SessionError::config(format!("failed to build webhook sink: {}", e)))?,
            ),
            None => Arc::new(LogSink::new()),
        };

        Ok(Self::new(
            feature,
            Arc::new(engine),
            notifier,
            SessionOptions::from_config(config, feature),
        ))
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn feature(&self) -> Feature {
        self.shared.feature
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Receive every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Stage a file for the next job.
    ///
    /// `None` is a no-op. A rejected file leaves the current selection in
    /// place and is reported both as an error and on the snapshot.
    pub fn select_file(&self, candidate: Option<UploadCandidate>) -> SessionResult<()> {
        let Some(candidate) = candidate else {
            return Ok(());
        };

        let mut state = self.shared.lock();
        let status = state.snapshot.status;
        if status != JobStatus::Idle {
            return Err(SessionError::invalid_state("select a file", status));
        }

        let state = &mut *state;
        match state.gate.select(Some(candidate)) {
            Ok(staged) => {
                let (name, preview) = staged
                    .map(|s| (s.file_name.clone(), s.preview().url().to_string()))
                    .unzip();
                state.snapshot.staged_file = name;
                state.snapshot.preview = preview;
                state.snapshot.error = None;
                state.snapshot.touch();
                self.shared.publish(state);
                Ok(())
            }
            Err(e) => {
                self.shared.logger.log_warning(&e.to_string());
                state.snapshot.error = Some(e.to_string());
                state.snapshot.touch();
                self.shared.publish(state);
                Err(e)
            }
        }
    }

    /// Upload the staged file and start polling.
    ///
    /// Any job the engine still runs for this feature is stopped first. If
    /// the session is reset while the upload is in flight the new job is
    /// stopped again and [`SessionError::Superseded`] is returned.
    ///
    /// A start issued while a superseded upload is still in flight waits for
    /// that upload and its release before contacting the engine.
    ///
    /// Cancelling this future mid-upload leaves the session `Uploading`;
    /// [`JobSession::reset`] recovers it.
    pub async fn start(&self) -> SessionResult<()> {
        let shared = &self.shared;
        shared.options.validate()?;

        let (payload, epoch) = {
            let mut state = shared.lock();
            let status = state.snapshot.status;
            if status != JobStatus::Idle {
                return Err(SessionError::invalid_state("start", status));
            }

            let Some(payload) = state.gate.staged().map(|s| s.payload()) else {
                let err = SessionError::validation("Please select a video file first");
                state.snapshot.error = Some(err.to_string());
                state.snapshot.touch();
                shared.publish(&state);
                return Err(err);
            };

            state.failures.reset();
            state.snapshot.error = None;
            state.snapshot.progress_hint = 0;
            state.snapshot.summary = shared.accumulator.empty();
            state.snapshot.set_status(JobStatus::Uploading);
            shared.publish(&state);

            (payload, state.epoch)
        };

        let _turn = shared.engine_turn.lock().await;
        let superseded = shared.lock().epoch != epoch;
        if superseded {
            debug!("Session {} was reset before its upload began", shared.id);
            return Err(SessionError::Superseded);
        }

        shared.logger.log_start(&payload.file_name);

        let span = shared.logger.create_span();
        release_job(shared.engine.as_ref(), shared.feature, &shared.logger, "previous job")
            .instrument(span.clone())
            .await;

        let started = Instant::now();
        let result = shared
            .engine
            .start_job(shared.feature, &payload)
            .instrument(span)
            .await;
        metrics::record_job_started(shared.feature, result.is_ok(), started.elapsed().as_secs_f64());

        let outcome = {
            let mut state = shared.lock();
            if state.epoch != epoch || state.snapshot.status != JobStatus::Uploading {
                StartOutcome::Superseded {
                    accepted: result.is_ok(),
                }
            } else {
                match result {
                    Err(e) => {
                        let err = SessionError::from_start_failure(e);
                        state.snapshot.fail(err.to_string());
                        shared.publish(&state);
                        StartOutcome::Failed(err)
                    }
                    Ok(()) => {
                        state.snapshot.set_status(JobStatus::Processing);
                        let previous = state.poller.replace(shared.spawn_poller(epoch));
                        shared.publish(&state);
                        StartOutcome::Started(previous)
                    }
                }
            }
        };

        match outcome {
            StartOutcome::Superseded { accepted } => {
                debug!("Session {} was reset during upload", shared.id);
                if accepted {
                    release_job(shared.engine.as_ref(), shared.feature, &shared.logger, "superseded job")
                        .await;
                }
                Err(SessionError::Superseded)
            }
            StartOutcome::Failed(err) => {
                shared.logger.log_error(&err.to_string());
                metrics::record_job_finished(shared.feature, JobStatus::Failed);
                Err(err)
            }
            StartOutcome::Started(previous) => {
                drop(previous);
                shared.logger.log_progress("upload accepted, polling for results");
                Ok(())
            }
        }
    }

    /// Stop the running job.
    ///
    /// A no-op unless the job is processing, so it is safe to call any
    /// number of times. The snapshot changes before the engine is contacted.
    pub async fn stop(&self) {
        let shared = &self.shared;

        let poller = {
            let mut state = shared.lock();
            if state.snapshot.status != JobStatus::Processing {
                return;
            }
            state.epoch += 1;
            state.snapshot.set_status(JobStatus::Stopped);
            shared.publish(&state);
            state.poller.take()
        };
        drop(poller);

        shared.logger.log_completion("stopped by user");
        metrics::record_job_finished(shared.feature, JobStatus::Stopped);

        release_job(shared.engine.as_ref(), shared.feature, &shared.logger, "stopped job").await;
    }

    /// Return to idle, discarding the result and the staged file.
    ///
    /// A processing job is stopped first. Resetting during an upload makes
    /// the pending [`JobSession::start`] return [`SessionError::Superseded`].
    pub async fn reset(&self) {
        self.stop().await;

        let shared = &self.shared;
        let (poller, still_running) = {
            let mut state = shared.lock();
            let still_running = state.snapshot.status == JobStatus::Processing;
            state.epoch += 1;
            state.gate.clear();
            state.failures.reset();
            state.snapshot.reset();
            shared.publish(&state);
            (state.poller.take(), still_running)
        };
        drop(poller);

        if still_running {
            release_job(shared.engine.as_ref(), shared.feature, &shared.logger, "reset job").await;
        }

        debug!("Session {} reset", shared.id);
    }

    /// Tear the session down and wait for the engine to release the job.
    pub async fn shutdown(self) {
        let (poller, needs_release) = self.shared.teardown();
        drop(poller);

        if needs_release {
            let shared = &self.shared;
            release_job(shared.engine.as_ref(), shared.feature, &shared.logger, "abandoned job").await;
        }
    }
}

impl Drop for JobSession {
    fn drop(&mut self) {
        let (poller, needs_release) = self.shared.teardown();
        drop(poller);

        if !needs_release {
            return;
        }

        let engine = Arc::clone(&self.shared.engine);
        let feature = self.shared.feature;
        let logger = self.shared.logger.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    release_job(engine.as_ref(), feature, &logger, "abandoned job").await;
                });
            }
            Err(_) => logger.log_warning("no runtime to stop the engine job on teardown"),
        }
    }
}

impl std::fmt::Debug for JobSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSession")
            .field("id", &self.shared.id)
            .field("feature", &self.shared.feature)
            .field("status", &self.shared.snapshot_tx.borrow().status)
            .finish()
    }
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot_tx.send_replace(state.snapshot.clone());
    }

    fn spawn_poller(self: &Arc<Self>, epoch: u64) -> Poller {
        let engine = Arc::clone(&self.engine);
        let feature = self.feature;
        let on_sample: Weak<Self> = Arc::downgrade(self);
        let on_error = on_sample.clone();

        Poller::start(
            move || {
                let engine = Arc::clone(&engine);
                async move {
                    let result = engine.fetch_sample(feature).await;
                    metrics::record_poll_fetch(feature, result.is_ok());
                    result
                }
            },
            self.options.poll_interval,
            move |sample| match on_sample.upgrade() {
                Some(shared) => shared.apply_sample(epoch, sample),
                None => PollControl::Stop,
            },
            move |err| match on_error.upgrade() {
                Some(shared) => shared.apply_failure(epoch, err),
                None => PollControl::Stop,
            },
        )
    }

    fn apply_sample(&self, epoch: u64, sample: PollSample) -> PollControl {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.epoch != epoch || state.snapshot.status != JobStatus::Processing {
            return PollControl::Stop;
        }

        let summary = match self.accumulator.fold(&state.snapshot.summary, &sample) {
            Ok(summary) => summary,
            Err(e) => return self.record_poll_failure(state, e.to_string()),
        };

        state.failures.record_success();
        state.snapshot.summary = summary;
        state.snapshot.error = None;

        if sample.is_complete() {
            state.snapshot.complete();
            self.publish(state);

            self.logger.log_completion("engine finished processing");
            metrics::record_job_finished(self.feature, JobStatus::Complete);
            self.spawn_completion();
            return PollControl::Stop;
        }

        state.snapshot.bump_progress();
        self.publish(state);
        PollControl::Continue
    }

    fn apply_failure(&self, epoch: u64, err: EngineError) -> PollControl {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.epoch != epoch || state.snapshot.status != JobStatus::Processing {
            return PollControl::Stop;
        }

        self.record_poll_failure(state, err.to_string())
    }

    fn record_poll_failure(&self, state: &mut SessionState, message: String) -> PollControl {
        let should_log = state.failures.record_failure();

        if state.failures.is_exhausted() {
            let err = SessionError::PollingAbandoned {
                failures: state.failures.failure_count(),
                last_error: message,
            };
            self.logger.log_error(&err.to_string());
            state.snapshot.fail(err.to_string());
            self.publish(state);

            metrics::record_job_finished(self.feature, JobStatus::Failed);
            self.spawn_release("abandoned job");
            return PollControl::Stop;
        }

        let err = SessionError::TransientPoll(message);
        if should_log {
            self.logger.log_warning(&err.to_string());
        }
        state.snapshot.error = Some(err.to_string());
        state.snapshot.touch();
        self.publish(state);
        PollControl::Continue
    }

    /// Release the engine job and announce completion.
    fn spawn_completion(&self) {
        let engine = Arc::clone(&self.engine);
        let notifier = Arc::clone(&self.notifier);
        let logger = self.logger.clone();
        let feature = self.feature;
        let notification = Notification::job_complete(feature, self.id);

        tokio::spawn(async move {
            let notify = async {
                if notifier.permission() != NotificationPermission::Granted {
                    return;
                }
                if let Err(e) = notifier.notify(&notification).await {
                    logger.log_warning(&format!("completion notification failed: {}", e));
                }
            };

            tokio::join!(
                release_job(engine.as_ref(), feature, &logger, "completed job"),
                notify
            );
        });
    }

    fn spawn_release(&self, reason: &'static str) {
        let engine = Arc::clone(&self.engine);
        let logger = self.logger.clone();
        let feature = self.feature;

        tokio::spawn(async move {
            release_job(engine.as_ref(), feature, &logger, reason).await;
        });
    }

    /// Detach the session from the engine.
    ///
    /// Returns the poller to drop outside the lock and whether the engine
    /// may still be running a job.
    fn teardown(&self) -> (Option<Poller>, bool) {
        let mut state = self.lock();
        if state.torn_down {
            return (None, false);
        }
        state.torn_down = true;
        state.epoch += 1;

        let needs_release = state.snapshot.status.is_active();
        if needs_release {
            state.snapshot.set_status(JobStatus::Stopped);
            self.publish(&state);
            metrics::record_job_finished(self.feature, JobStatus::Stopped);
        }
        state.gate.clear();

        (state.poller.take(), needs_release)
    }
}

/// Best-effort stop. Failures are logged, never returned.
async fn release_job(engine: &dyn AnalysisEngine, feature: Feature, logger: &SessionLogger, reason: &str) {
    match engine.stop_job(feature).await {
        Ok(()) => {
            debug!("Engine released {} ({})", feature, reason);
            metrics::record_stop_request(feature, true);
        }
        Err(e) => {
            logger.log_warning(&format!("failed to stop {} on engine: {}", reason, e));
            metrics::record_stop_request(feature, false);
        }
    }
}
