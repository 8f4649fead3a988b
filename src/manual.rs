use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::event::EventId;
use crate::trigger::{millis, Fire, Trigger};

/// The manually triggered clock: resident "now", the override queue, and the
/// trigger registry.
///
/// One lock covers resident now, the queue, and every registry mutation, and
/// every [`Trigger::fire`] runs under it. Advancing now never fires anything;
/// firing is driven exclusively by [`trigger`](ManualTime::trigger).
pub(crate) struct ManualTime {
    state: Mutex<ManualState>,
}

struct ManualState {
    now: DateTime<Utc>,
    now_queue: VecDeque<DateTime<Utc>>,
    registry: HashMap<EventId, Entry>,
}

/// Per-id dispatch state: fires declared before any waiter arrived, plus the
/// waiters currently registered, oldest first.
#[derive(Default)]
struct Entry {
    credit: u64,
    waiters: Vec<Trigger>,
}

impl Entry {
    /// Drain accumulated credit: each unit fires every waiter currently in
    /// the list once (oldest first), keeping only those that ask to stay.
    fn drain(&mut self, now: DateTime<Utc>) {
        while self.credit > 0 && !self.waiters.is_empty() {
            self.waiters.retain_mut(|trigger| trigger.fire(now) == Fire::Keep);
            self.credit -= 1;
        }
    }
}

impl ManualTime {
    pub(crate) fn new(start_at: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: start_at,
                now_queue: VecDeque::new(),
                registry: HashMap::new(),
            }),
        }
    }

    /// Current notional now.
    ///
    /// Pops the override queue head if one is queued; the last popped value
    /// sticks as the new resident now.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        let mut state = self.state.lock();
        if let Some(next) = state.now_queue.pop_front() {
            state.now = next;
        }
        state.now
    }

    /// Resident now without consuming the override queue. Used to stamp
    /// trigger payloads and to arm tickers and timers.
    pub(crate) fn resident_now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    /// Add to resident now. Does not touch the override queue and never
    /// fires anything.
    pub(crate) fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.now = state.now + millis(duration);
    }

    /// Queue values for successive `now()` calls to return. Once the queue
    /// is consumed the last value sticks as the new resident now.
    pub(crate) fn queue_nows(&self, times: impl IntoIterator<Item = DateTime<Utc>>) {
        self.state.lock().now_queue.extend(times);
    }

    /// Append `trigger` at the tail of `id`'s waiter list, creating the
    /// entry if absent, then drain any credit already declared for the id.
    /// A registration arriving after its event was declared fires
    /// synchronously here.
    pub(crate) fn register(&self, id: EventId, trigger: Trigger) {
        let mut state = self.state.lock();
        let now = state.now;
        tracing::trace!(%id, "register");
        let entry = state.registry.entry(id).or_default();
        entry.waiters.push(trigger);
        entry.drain(now);
    }

    /// Declare one occurrence of each id, in the given order.
    ///
    /// An id with no waiters accrues a unit of credit for a future
    /// registration to consume; an id with waiters fires all of them for
    /// that unit. There is no cross-id ordering guarantee.
    pub(crate) fn trigger(&self, ids: impl IntoIterator<Item = EventId>) {
        let mut state = self.state.lock();
        let now = state.now;
        for id in ids {
            tracing::trace!(%id, "trigger");
            let entry = state.registry.entry(id).or_default();
            entry.credit += 1;
            entry.drain(now);
        }
    }

    /// Drop the named entries, discarding credit and abandoning any
    /// still-registered waiters without firing them.
    pub(crate) fn unregister(&self, ids: impl IntoIterator<Item = EventId>) {
        let mut state = self.state.lock();
        for id in ids {
            if state.registry.remove(&id).is_some() {
                tracing::trace!(%id, "unregister");
            }
        }
    }

    /// Drop every entry, returning to a fresh view of the registry.
    pub(crate) fn unregister_all(&self) {
        self.state.lock().registry.clear();
    }

    pub(crate) fn waiter_count(&self, id: EventId) -> usize {
        self.state
            .lock()
            .registry
            .get(&id)
            .map(|entry| entry.waiters.len())
            .unwrap_or(0)
    }

    pub(crate) fn pending_credit(&self, id: EventId) -> u64 {
        self.state
            .lock()
            .registry
            .get(&id)
            .map(|entry| entry.credit)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn sleep_trigger() -> (Trigger, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Trigger::Sleep { tx: Some(tx) }, rx)
    }

    #[test]
    fn trigger_before_registration_becomes_credit() {
        let manual = ManualTime::new(Utc::now());
        let id = EventId(7);

        manual.trigger([id]);
        assert_eq!(manual.pending_credit(id), 1);
        assert_eq!(manual.waiter_count(id), 0);

        let (trigger, mut rx) = sleep_trigger();
        manual.register(id, trigger);

        // Fired synchronously during registration.
        assert!(rx.try_recv().is_ok());
        assert_eq!(manual.pending_credit(id), 0);
        assert_eq!(manual.waiter_count(id), 0);
    }

    #[test]
    fn one_credit_releases_all_current_waiters() {
        let manual = ManualTime::new(Utc::now());
        let id = EventId(1);

        let (w1, mut rx1) = sleep_trigger();
        let (w2, mut rx2) = sleep_trigger();
        manual.register(id, w1);
        manual.register(id, w2);

        manual.trigger([id]);

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn accumulated_credit_consumed_in_registration_order() {
        let manual = ManualTime::new(Utc::now());
        let id = EventId(2);

        manual.trigger([id]);
        manual.trigger([id]);
        assert_eq!(manual.pending_credit(id), 2);

        let (w1, mut rx1) = sleep_trigger();
        manual.register(id, w1);
        assert!(rx1.try_recv().is_ok());
        assert_eq!(manual.pending_credit(id), 1);

        let (w2, mut rx2) = sleep_trigger();
        manual.register(id, w2);
        assert!(rx2.try_recv().is_ok());
        assert_eq!(manual.pending_credit(id), 0);
    }

    #[test]
    fn credit_is_id_scoped() {
        let manual = ManualTime::new(Utc::now());

        manual.trigger([EventId(1)]);

        let (trigger, mut rx) = sleep_trigger();
        manual.register(EventId(2), trigger);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unregister_abandons_waiters_silently() {
        let manual = ManualTime::new(Utc::now());
        let id = EventId(3);

        let (trigger, mut rx) = sleep_trigger();
        manual.register(id, trigger);
        manual.unregister([id]);

        manual.trigger([id]);
        // The old registration is gone; the trigger became fresh credit.
        assert!(rx.try_recv().is_err());
        assert_eq!(manual.pending_credit(id), 1);
    }

    #[test]
    fn advance_does_not_fire() {
        let manual = ManualTime::new(Utc::now());
        let id = EventId(4);

        let (trigger, mut rx) = sleep_trigger();
        manual.register(id, trigger);

        manual.advance(Duration::from_secs(3600));
        assert!(rx.try_recv().is_err());
        assert_eq!(manual.waiter_count(id), 1);
    }

    #[test]
    fn queued_nows_stick() {
        let start = Utc::now();
        let manual = ManualTime::new(start);
        let t10 = start + chrono::Duration::seconds(10);
        let t20 = start + chrono::Duration::seconds(20);

        manual.queue_nows([t10, t20]);

        assert_eq!(manual.now(), t10);
        assert_eq!(manual.now(), t20);
        assert_eq!(manual.now(), t20);
    }

    #[test]
    fn advance_leaves_queue_untouched() {
        let start = Utc::now();
        let manual = ManualTime::new(start);
        let t10 = start + chrono::Duration::seconds(10);

        manual.queue_nows([t10]);
        manual.advance(Duration::from_secs(60));

        // The queued value still wins the next call.
        assert_eq!(manual.now(), t10);
    }
}
