use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use std::{sync::Arc, time::Duration};

use crate::event::EventId;
use crate::inner::TimeInner;
use crate::trigger::{TickState, Trigger};

/// Handle to a repeating tick.
///
/// Created by [`TimeHandle::new_ticker`](crate::TimeHandle::new_ticker) and
/// [`TimeHandle::tick`](crate::TimeHandle::tick). On a manual clock each
/// trigger of the id delivers `armed-now + n * period`; note that times from
/// several tickers can arrive out of order relative to each other if their
/// ids are triggered out of order.
pub struct TimeTicker {
    inner: TickerInner,
}

enum TickerInner {
    Realtime {
        interval: Option<Interval>,
    },
    Manual {
        state: Arc<TickState>,
        rx: mpsc::UnboundedReceiver<DateTime<Utc>>,
    },
}

impl TimeTicker {
    pub(crate) fn new(inner: &TimeInner, period: Duration, id: EventId) -> Self {
        let inner = match inner {
            TimeInner::Realtime(_) => TickerInner::Realtime {
                interval: Some(new_interval(period)),
            },
            TimeInner::Manual(manual) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let state = Arc::new(TickState::new(tx, manual.resident_now(), period));
                manual.register(id, Trigger::Tick(Arc::clone(&state)));
                TickerInner::Manual { state, rx }
            }
        };
        Self { inner }
    }

    /// Wait for the next tick and return its timestamp.
    ///
    /// Pends forever on a stopped or abandoned ticker, matching the
    /// semantics of reading a channel nobody delivers on.
    pub async fn tick(&mut self) -> DateTime<Utc> {
        match &mut self.inner {
            TickerInner::Realtime { interval } => match interval {
                Some(interval) => {
                    interval.tick().await;
                    Utc::now()
                }
                None => std::future::pending().await,
            },
            TickerInner::Manual { rx, .. } => match rx.recv().await {
                Some(stamp) => stamp,
                None => std::future::pending().await,
            },
        }
    }

    /// Stop the ticker. Further fires on its id deliver nothing.
    pub fn stop(&mut self) {
        match &mut self.inner {
            TickerInner::Realtime { interval } => *interval = None,
            TickerInner::Manual { state, .. } => state.stop(),
        }
    }

    /// Re-arm with a new period, restarting a stopped ticker.
    ///
    /// On a manual clock this only takes effect if the ticker is still
    /// registered; a ticker discarded by firing while stopped stays inert.
    pub fn reset(&mut self, period: Duration) {
        match &mut self.inner {
            TickerInner::Realtime { interval } => *interval = Some(new_interval(period)),
            TickerInner::Manual { state, .. } => state.reset(period),
        }
    }
}

fn new_interval(period: Duration) -> Interval {
    // First tick lands after one full period, not immediately.
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
