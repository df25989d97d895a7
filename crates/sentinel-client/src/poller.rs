//! Cancellable fixed-interval poller.
//!
//! A poller calls a fetch function once per period, starting one period
//! after creation. Fetches run in their own tasks and may overlap; their
//! results are handed to the callbacks in the order they arrive.
//!
//! Stopping closes a delivery gate shared by all in-flight fetches. Once the
//! gate is closed no new fetch is started and any result that arrives
//! afterwards is dropped without reaching a callback. Stopping is
//! idempotent and happens automatically when the poller is dropped.
//!
//! Callbacks and the fetch function run while the gate is held. They must
//! not stop or drop the poller that invokes them; returning
//! [`PollControl::Stop`] is the way to end polling from inside a callback.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// What a callback wants the poller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

type Handler<T, E> = Box<dyn FnMut(Result<T, E>) -> PollControl + Send>;

/// Shortest period a poller will tick at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Type-erased view of the delivery gate.
trait Gate: Send + Sync {
    fn close(&self);
    fn is_open(&self) -> bool;
}

struct Delivery<T, E> {
    handler: Mutex<Option<Handler<T, E>>>,
}

impl<T, E> Delivery<T, E> {
    /// Create the next request, unless the gate is closed.
    ///
    /// The gate stays locked while `fetch` runs, so once `close` returns no
    /// further request is created.
    fn begin<R>(&self, fetch: impl FnOnce() -> R) -> Option<R> {
        let guard = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|_| fetch())
    }

    fn deliver(&self, result: Result<T, E>) {
        let mut guard = self.handler.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(handler) = guard.as_mut() else {
            debug!("Discarding poll result that arrived after stop");
            return;
        };

        if handler(result) == PollControl::Stop {
            let finished = guard.take();
            drop(guard);
            drop(finished);
        }
    }
}

impl<T: Send, E: Send> Gate for Delivery<T, E> {
    fn close(&self) {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(handler);
    }

    fn is_open(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Handle to a running poll loop.
pub struct Poller {
    gate: Arc<dyn Gate>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Poller {
    /// Start polling.
    ///
    /// `on_sample` receives successful fetches and `on_error` failed ones.
    /// Either can end polling by returning [`PollControl::Stop`].
    ///
    /// A zero `period` is raised to [`MIN_PERIOD`]. Must be called from
    /// within a Tokio runtime.
    pub fn start<F, Fut, T, E, S, R>(fetch: F, period: Duration, mut on_sample: S, mut on_error: R) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        S: FnMut(T) -> PollControl + Send + 'static,
        R: FnMut(E) -> PollControl + Send + 'static,
    {
        let handler: Handler<T, E> = Box::new(move |result| match result {
            Ok(sample) => on_sample(sample),
            Err(err) => on_error(err),
        });
        let delivery = Arc::new(Delivery {
            handler: Mutex::new(Some(handler)),
        });

        let period = period.max(MIN_PERIOD);
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let loop_delivery = Arc::clone(&delivery);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("Poller received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(request) = loop_delivery.begin(&fetch) else {
                            break;
                        };

                        let delivery = Arc::clone(&loop_delivery);
                        tokio::spawn(async move {
                            // Stopped before the request was first polled
                            if !delivery.is_open() {
                                return;
                            }
                            let result = request.await;
                            delivery.deliver(result);
                        });
                    }
                }
            }
        });

        Self {
            gate: delivery,
            shutdown,
            task,
        }
    }

    /// Stop polling. Safe to call any number of times.
    pub fn stop(&self) {
        self.gate.close();
        self.shutdown.send_replace(true);
    }

    /// Whether the poller will still start fetches and deliver results.
    pub fn is_active(&self) -> bool {
        self.gate.is_open() && !self.task.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("active", &self.is_active())
            .finish()
    }
}
