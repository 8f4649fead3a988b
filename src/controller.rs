use chrono::{DateTime, Utc};

use std::{sync::Arc, time::Duration};

use crate::event::EventId;
use crate::manual::ManualTime;

/// Test-driver control surface of the manual clock.
///
/// Created alongside a manual [`TimeHandle`](crate::TimeHandle). Cheap to
/// clone; all clones drive the same clock.
#[derive(Clone)]
pub struct ManualController {
    pub(crate) manual: Arc<ManualTime>,
}

impl ManualController {
    /// Declare one occurrence of each id, in the given order, releasing
    /// sleeps, delivering ticks and timers, running callbacks and expiring
    /// deadlines registered under those ids.
    ///
    /// This is the ONLY way such events occur on a manual clock; advancing
    /// "now" past a timer's notional due time does nothing. An id with no
    /// current waiter accrues a unit of pending credit that the next
    /// registration on that id consumes synchronously.
    ///
    /// Firing an id that carries a callback timer spawns the callback as a
    /// tokio task, so such triggers must happen inside a tokio runtime.
    pub fn trigger(&self, ids: impl IntoIterator<Item = impl Into<EventId>>) {
        self.manual.trigger(ids.into_iter().map(Into::into));
    }

    /// Drop the named ids entirely, discarding pending credit and abandoning
    /// any registered waiters without firing them.
    ///
    /// Normally the first registration on an id sticks: code that creates
    /// several timers on the same id in a loop only has the first one
    /// working. Unregister the id between uses to reuse it.
    pub fn unregister(&self, ids: impl IntoIterator<Item = impl Into<EventId>>) {
        self.manual.unregister(ids.into_iter().map(Into::into));
    }

    /// Drop every id, returning to a fresh view of the registry.
    pub fn unregister_all(&self) {
        self.manual.unregister_all();
    }

    /// Advance the clock's idea of "now" by the given duration.
    ///
    /// This is bookkeeping for stamped timestamps only; it never fires
    /// anything and leaves any queued nows untouched.
    pub fn advance(&self, duration: Duration) {
        self.manual.advance(duration);
    }

    /// Queue values for successive `now()` calls to return. Once consumed,
    /// the last value sticks as the new now.
    ///
    /// Useful when code under test measures elapsed time with back-to-back
    /// `now()` calls and there is nowhere for the test to intercede.
    pub fn queue_nows(&self, times: impl IntoIterator<Item = DateTime<Utc>>) {
        self.manual.queue_nows(times);
    }

    /// The clock's current idea of "now". Consumes a queued now if one is
    /// pending, exactly as the handle's `now()` does.
    pub fn now(&self) -> DateTime<Utc> {
        self.manual.now()
    }

    /// Number of waiters currently registered under `id`. Useful for test
    /// synchronization: wait until a spawned task has registered before
    /// triggering.
    pub fn waiter_count(&self, id: impl Into<EventId>) -> usize {
        self.manual.waiter_count(id.into())
    }

    /// Units of declared-but-unconsumed credit for `id`.
    pub fn pending_credit(&self, id: impl Into<EventId>) -> u64 {
        self.manual.pending_credit(id.into())
    }
}

impl std::fmt::Debug for ManualController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualController")
            .field("now", &self.manual.resident_now())
            .finish()
    }
}
