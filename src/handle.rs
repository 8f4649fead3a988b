use chrono::{DateTime, Utc};

use std::{sync::Arc, time::Duration};

use crate::config::{truncate_to_millis, TimeConfig};
use crate::context::{CancelHandle, TimeContext};
use crate::controller::ManualController;
use crate::event::EventId;
use crate::inner::TimeInner;
use crate::manual::ManualTime;
use crate::realtime::RealtimeTime;
use crate::sleep::{TimeAfter, TimeSleep};
use crate::ticker::TimeTicker;
use crate::timer::TimeTimer;
use crate::trigger::{millis, Trigger};

/// A handle to a clock for getting time and building time events.
///
/// This is the main interface for time operations. It is cheap to clone and
/// can be shared across tasks and threads; all clones share the same
/// underlying clock.
///
/// Every time-producing operation takes a caller-assigned [`EventId`]. On a
/// manual clock the id is what a test driver later passes to
/// [`ManualController::trigger`] to make the event occur; the realtime clock
/// accepts and ignores it.
///
/// ```rust
/// use manual_time::TimeHandle;
/// use std::time::Duration;
///
/// # async fn example() {
/// // Production: passthrough to the system clock.
/// let time = TimeHandle::realtime();
///
/// // Testing: a manually triggered clock.
/// let (time, ctrl) = TimeHandle::manual();
///
/// let time2 = time.clone();
/// tokio::spawn(async move {
///     time2.sleep(Duration::from_secs(60), 1).await;
///     // released by the trigger below, regardless of wall-clock time
/// });
///
/// tokio::task::yield_now().await;
/// ctrl.trigger([1]);
/// # }
/// ```
#[derive(Clone)]
pub struct TimeHandle {
    inner: Arc<TimeInner>,
}

impl TimeHandle {
    /// Create a realtime handle that uses the system clock and tokio timers.
    pub fn realtime() -> Self {
        Self {
            inner: Arc::new(TimeInner::Realtime(RealtimeTime)),
        }
    }

    /// Create a manual handle starting at the current time, along with the
    /// controller that drives it.
    pub fn manual() -> (Self, ManualController) {
        Self::manual_at(Utc::now())
    }

    /// Create a manual handle starting at a specific time (truncated to
    /// millisecond precision).
    pub fn manual_at(start_at: DateTime<Utc>) -> (Self, ManualController) {
        let manual = Arc::new(ManualTime::new(truncate_to_millis(start_at)));
        let handle = Self {
            inner: Arc::new(TimeInner::Manual(Arc::clone(&manual))),
        };
        (handle, ManualController { manual })
    }

    /// Build a handle from configuration. Returns a controller only when the
    /// configuration selects the manual clock.
    pub fn from_config(config: TimeConfig) -> (Self, Option<ManualController>) {
        if config.realtime {
            (Self::realtime(), None)
        } else {
            let start_at = config
                .manual
                .map(|manual| manual.start_at)
                .unwrap_or_else(Utc::now);
            let (handle, ctrl) = Self::manual_at(start_at);
            (handle, Some(ctrl))
        }
    }

    /// Get the current time.
    ///
    /// For the realtime clock this is `Utc::now()`. For the manual clock it
    /// is the resident now, or the next queued override if one is pending.
    pub fn now(&self) -> DateTime<Utc> {
        match &*self.inner {
            TimeInner::Realtime(rt) => rt.now(),
            TimeInner::Manual(manual) => manual.now(),
        }
    }

    /// A future resolving to the timestamp the event claims to have happened
    /// at: `now-at-fire + duration` on a manual clock.
    pub fn after(&self, duration: Duration, id: impl Into<EventId>) -> TimeAfter {
        TimeAfter::new(&self.inner, duration, id.into())
    }

    /// Halt execution until released: by the duration elapsing (realtime) or
    /// by a trigger on `id` (manual).
    pub fn sleep(&self, duration: Duration, id: impl Into<EventId>) -> TimeSleep {
        TimeSleep::new(&self.inner, duration, id.into())
    }

    /// Convenience for [`new_ticker`](Self::new_ticker) when only the tick
    /// stream is needed.
    pub fn tick(&self, period: Duration, id: impl Into<EventId>) -> TimeTicker {
        self.new_ticker(period, id)
    }

    /// Create a repeating ticker. On a manual clock it snapshots the resident
    /// now at creation and stamps each tick one period further along.
    pub fn new_ticker(&self, period: Duration, id: impl Into<EventId>) -> TimeTicker {
        TimeTicker::new(&self.inner, period, id.into())
    }

    /// Create a single-shot timer delivering `now-at-creation + duration`.
    pub fn new_timer(&self, duration: Duration, id: impl Into<EventId>) -> TimeTimer {
        TimeTimer::new(&self.inner, duration, id.into())
    }

    /// Run `callback` on its own task when the timer fires. The returned
    /// handle supports `stop`/`reset` but has no channel.
    pub fn after_func(
        &self,
        duration: Duration,
        callback: impl Fn() + Send + Sync + 'static,
        id: impl Into<EventId>,
    ) -> TimeTimer {
        TimeTimer::new_func(&self.inner, duration, Arc::new(callback), id.into())
    }

    /// Derive a context that closes at `deadline`.
    ///
    /// On a manual clock expiry is driven by triggering `id`, never by the
    /// deadline value itself. The context also closes when `parent` closes
    /// (retaining the parent's reason) or when the returned handle cancels
    /// it, whichever comes first.
    ///
    /// Construction spawns the observer task watching the parent, so this
    /// must be called inside a tokio runtime.
    pub fn with_deadline(
        &self,
        parent: &TimeContext,
        deadline: DateTime<Utc>,
        id: impl Into<EventId>,
    ) -> (TimeContext, CancelHandle) {
        match &*self.inner {
            TimeInner::Realtime(_) => {
                let expire_after = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                TimeContext::child(parent, deadline, Some(expire_after))
            }
            TimeInner::Manual(manual) => {
                let (ctx, cancel) = TimeContext::child(parent, deadline, None);
                manual.register(id.into(), Trigger::Deadline(Arc::clone(&ctx.shared)));
                (ctx, cancel)
            }
        }
    }

    /// [`with_deadline`](Self::with_deadline) at `now() + timeout`.
    pub fn with_timeout(
        &self,
        parent: &TimeContext,
        timeout: Duration,
        id: impl Into<EventId>,
    ) -> (TimeContext, CancelHandle) {
        let deadline = self.now() + millis(timeout);
        self.with_deadline(parent, deadline, id)
    }

    pub fn is_realtime(&self) -> bool {
        matches!(&*self.inner, TimeInner::Realtime(_))
    }

    pub fn is_manual(&self) -> bool {
        matches!(&*self.inner, TimeInner::Manual(_))
    }
}

impl std::fmt::Debug for TimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.inner {
            TimeInner::Realtime(_) => f.debug_struct("TimeHandle::Realtime").finish(),
            TimeInner::Manual(manual) => f
                .debug_struct("TimeHandle::Manual")
                .field("now", &manual.resident_now())
                .finish(),
        }
    }
}
