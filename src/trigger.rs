use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};

use crate::context::{CancelReason, ContextShared};

/// Convert a std duration to a chrono delta at millisecond precision,
/// saturating on durations too large to represent.
pub(crate) fn millis(duration: Duration) -> chrono::Duration {
    i64::try_from(duration.as_millis())
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Outcome of firing a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fire {
    /// Keep the trigger registered for the next fire (repeating variants).
    Keep,
    /// Remove the trigger from its waiter list permanently.
    Discard,
}

/// A registered unit of deferred work tied to an [`EventId`](crate::EventId).
///
/// The kind set is fixed, so the dispatch loop matches exhaustively.
pub(crate) enum Trigger {
    /// One-shot delivery of `now + duration`.
    After {
        duration: Duration,
        tx: Option<oneshot::Sender<DateTime<Utc>>>,
    },
    /// One-shot release of a sleeping task.
    Sleep { tx: Option<oneshot::Sender<()>> },
    /// Repeating tick.
    Tick(Arc<TickState>),
    /// Resettable single-shot timer.
    Timer(Arc<TimerState>),
    /// Callback timer.
    Func(Arc<FuncState>),
    /// Cancellable deadline.
    Deadline(Arc<ContextShared>),
}

impl Trigger {
    /// Run the variant's delivery behavior.
    ///
    /// Always called with the registry lock held, so nothing here may block:
    /// deliveries go through non-blocking senders and callbacks are spawned
    /// as their own task.
    pub(crate) fn fire(&mut self, now: DateTime<Utc>) -> Fire {
        match self {
            Trigger::After { duration, tx } => {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(now + millis(*duration));
                }
                Fire::Discard
            }
            Trigger::Sleep { tx } => {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
                Fire::Discard
            }
            Trigger::Tick(state) => state.fire(),
            Trigger::Timer(state) => state.fire(),
            Trigger::Func(state) => state.fire(),
            Trigger::Deadline(shared) => {
                shared.close(CancelReason::DeadlineExceeded);
                Fire::Discard
            }
        }
    }
}

/// Shared state behind a manual ticker handle.
///
/// Carries its own running time, advanced by one period per fire, so ticks
/// are stamped `armed-now + n * period` regardless of the resident now.
pub(crate) struct TickState {
    tx: mpsc::UnboundedSender<DateTime<Utc>>,
    inner: Mutex<TickInner>,
}

struct TickInner {
    now: DateTime<Utc>,
    period: Duration,
    stopped: bool,
}

impl TickState {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<DateTime<Utc>>,
        armed_at: DateTime<Utc>,
        period: Duration,
    ) -> Self {
        Self {
            tx,
            inner: Mutex::new(TickInner {
                now: armed_at,
                period,
                stopped: false,
            }),
        }
    }

    fn fire(&self) -> Fire {
        let mut inner = self.inner.lock();
        if inner.stopped {
            return Fire::Discard;
        }
        inner.now = inner.now + millis(inner.period);
        let _ = self.tx.send(inner.now);
        Fire::Keep
    }

    pub(crate) fn stop(&self) {
        self.inner.lock().stopped = true;
    }

    pub(crate) fn reset(&self, period: Duration) {
        let mut inner = self.inner.lock();
        inner.period = period;
        inner.stopped = false;
    }
}

/// Shared state behind a manual single-shot timer handle.
pub(crate) struct TimerState {
    tx: mpsc::UnboundedSender<DateTime<Utc>>,
    inner: Mutex<TimerInner>,
}

struct TimerInner {
    armed_at: DateTime<Utc>,
    duration: Duration,
    stopped: bool,
}

impl TimerState {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<DateTime<Utc>>,
        armed_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            tx,
            inner: Mutex::new(TimerInner {
                armed_at,
                duration,
                stopped: false,
            }),
        }
    }

    fn fire(&self) -> Fire {
        let mut inner = self.inner.lock();
        if inner.stopped {
            return Fire::Discard;
        }
        inner.stopped = true;
        let _ = self.tx.send(inner.armed_at + millis(inner.duration));
        Fire::Discard
    }

    /// Returns whether the timer was active before the call.
    pub(crate) fn stop(&self) -> bool {
        let mut inner = self.inner.lock();
        let was_active = !inner.stopped;
        inner.stopped = true;
        was_active
    }

    /// Re-arm with a new duration. Returns whether the timer was active
    /// before the call.
    pub(crate) fn reset(&self, duration: Duration) -> bool {
        let mut inner = self.inner.lock();
        let was_active = !inner.stopped;
        inner.duration = duration;
        inner.stopped = false;
        was_active
    }
}

/// Shared state behind a manual callback timer handle.
pub(crate) struct FuncState {
    callback: Arc<dyn Fn() + Send + Sync>,
    stopped: Mutex<bool>,
}

impl FuncState {
    pub(crate) fn new(callback: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self {
            callback,
            stopped: Mutex::new(false),
        }
    }

    fn fire(&self) -> Fire {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            let callback = Arc::clone(&self.callback);
            tokio::spawn(async move { callback() });
        }
        *stopped = true;
        Fire::Discard
    }

    /// Returns whether the timer was active before the call.
    pub(crate) fn stop(&self) -> bool {
        let mut stopped = self.stopped.lock();
        let was_active = !*stopped;
        *stopped = true;
        was_active
    }

    /// Re-arm so a later fire runs the callback again. Returns whether the
    /// timer was active before the call.
    pub(crate) fn reset(&self) -> bool {
        let mut stopped = self.stopped.lock();
        let was_active = !*stopped;
        *stopped = false;
        was_active
    }
}
