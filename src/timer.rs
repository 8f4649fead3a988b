use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};

use std::{pin::Pin, sync::Arc, time::Duration};

use crate::event::EventId;
use crate::inner::TimeInner;
use crate::trigger::{FuncState, TimerState, Trigger};

/// Handle to a single-shot timer.
///
/// Created by [`TimeHandle::new_timer`](crate::TimeHandle::new_timer) and
/// [`TimeHandle::after_func`](crate::TimeHandle::after_func).
///
/// [`stop`](Self::stop) and [`reset`](Self::reset) report whether the timer
/// was active before the call, so callers can detect whether they won a race
/// against a concurrent fire.
pub struct TimeTimer {
    inner: TimerHandleInner,
}

enum TimerHandleInner {
    Realtime(RealtimeTimer),
    RealtimeFunc(RealtimeFuncTimer),
    Manual {
        state: Arc<TimerState>,
        rx: mpsc::UnboundedReceiver<DateTime<Utc>>,
    },
    ManualFunc(Arc<FuncState>),
}

impl TimeTimer {
    pub(crate) fn new(inner: &TimeInner, duration: Duration, id: EventId) -> Self {
        let inner = match inner {
            TimeInner::Realtime(_) => TimerHandleInner::Realtime(RealtimeTimer::new(duration)),
            TimeInner::Manual(manual) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let state = Arc::new(TimerState::new(tx, manual.resident_now(), duration));
                manual.register(id, Trigger::Timer(Arc::clone(&state)));
                TimerHandleInner::Manual { state, rx }
            }
        };
        Self { inner }
    }

    pub(crate) fn new_func(
        inner: &TimeInner,
        duration: Duration,
        callback: Arc<dyn Fn() + Send + Sync>,
        id: EventId,
    ) -> Self {
        let inner = match inner {
            TimeInner::Realtime(_) => {
                TimerHandleInner::RealtimeFunc(RealtimeFuncTimer::new(callback, duration))
            }
            TimeInner::Manual(manual) => {
                let state = Arc::new(FuncState::new(callback));
                manual.register(id, Trigger::Func(Arc::clone(&state)));
                TimerHandleInner::ManualFunc(state)
            }
        };
        Self { inner }
    }

    /// Wait for the timer to deliver its timestamp.
    ///
    /// A manual timer delivers `armed-now + duration` once. Callback timers
    /// have no channel, so their `recv` pends forever; so does a timer that
    /// was stopped before firing.
    pub async fn recv(&mut self) -> DateTime<Utc> {
        match &mut self.inner {
            TimerHandleInner::Realtime(timer) => timer.recv().await,
            TimerHandleInner::RealtimeFunc(_) | TimerHandleInner::ManualFunc(_) => {
                std::future::pending().await
            }
            TimerHandleInner::Manual { rx, .. } => match rx.recv().await {
                Some(stamp) => stamp,
                None => std::future::pending().await,
            },
        }
    }

    /// Stop the timer. Returns whether it was active before the call.
    pub fn stop(&mut self) -> bool {
        match &mut self.inner {
            TimerHandleInner::Realtime(timer) => timer.stop(),
            TimerHandleInner::RealtimeFunc(timer) => timer.stop(),
            TimerHandleInner::Manual { state, .. } => state.stop(),
            TimerHandleInner::ManualFunc(state) => state.stop(),
        }
    }

    /// Re-arm the timer. Returns whether it was active before the call.
    ///
    /// On a manual clock the timer must still be registered for a later
    /// trigger to reach it; a timer discarded by a previous fire stays
    /// inert until its id is triggered through a fresh registration.
    pub fn reset(&mut self, duration: Duration) -> bool {
        match &mut self.inner {
            TimerHandleInner::Realtime(timer) => timer.reset(duration),
            TimerHandleInner::RealtimeFunc(timer) => timer.reset(duration),
            TimerHandleInner::Manual { state, .. } => state.reset(duration),
            // The callback variant keeps no duration; re-arming is enough.
            TimerHandleInner::ManualFunc(state) => state.reset(),
        }
    }
}

struct RealtimeTimer {
    sleep: Pin<Box<Sleep>>,
    deadline: Instant,
    stopped: bool,
    fired: bool,
}

impl RealtimeTimer {
    fn new(duration: Duration) -> Self {
        let deadline = Instant::now() + duration;
        Self {
            sleep: Box::pin(tokio::time::sleep_until(deadline)),
            deadline,
            stopped: false,
            fired: false,
        }
    }

    fn is_active(&self) -> bool {
        !self.stopped && !self.fired && Instant::now() < self.deadline
    }

    async fn recv(&mut self) -> DateTime<Utc> {
        if self.stopped || self.fired {
            return std::future::pending().await;
        }
        self.sleep.as_mut().await;
        self.fired = true;
        Utc::now()
    }

    fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        self.stopped = true;
        was_active
    }

    fn reset(&mut self, duration: Duration) -> bool {
        let was_active = self.is_active();
        self.deadline = Instant::now() + duration;
        self.sleep.as_mut().reset(self.deadline);
        self.stopped = false;
        self.fired = false;
        was_active
    }
}

struct RealtimeFuncTimer {
    callback: Arc<dyn Fn() + Send + Sync>,
    task: tokio::task::JoinHandle<()>,
}

impl RealtimeFuncTimer {
    fn new(callback: Arc<dyn Fn() + Send + Sync>, duration: Duration) -> Self {
        let task = Self::spawn(Arc::clone(&callback), duration);
        Self { callback, task }
    }

    fn spawn(
        callback: Arc<dyn Fn() + Send + Sync>,
        duration: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            callback();
        })
    }

    fn stop(&mut self) -> bool {
        let was_active = !self.task.is_finished();
        self.task.abort();
        was_active
    }

    fn reset(&mut self, duration: Duration) -> bool {
        let was_active = !self.task.is_finished();
        self.task.abort();
        self.task = Self::spawn(Arc::clone(&self.callback), duration);
        was_active
    }
}
