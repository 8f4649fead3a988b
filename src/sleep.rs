use chrono::{DateTime, Utc};
use pin_project::pin_project;
use tokio::sync::oneshot;
use tokio::time::Sleep;

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use crate::event::EventId;
use crate::inner::TimeInner;
use crate::trigger::Trigger;

/// A future that resolves to the timestamp an event claims to have happened
/// at.
///
/// Created by [`TimeHandle::after`](crate::TimeHandle::after). On a manual
/// clock it resolves when its id is triggered; if the id is unregistered
/// before that, the future stays pending forever.
#[pin_project]
pub struct TimeAfter {
    #[pin]
    inner: AfterInner,
}

#[pin_project(project = AfterInnerProj)]
enum AfterInner {
    Realtime {
        #[pin]
        sleep: Sleep,
    },
    Manual {
        rx: oneshot::Receiver<DateTime<Utc>>,
        done: bool,
    },
}

impl TimeAfter {
    pub(crate) fn new(inner: &TimeInner, duration: Duration, id: EventId) -> Self {
        let inner = match inner {
            TimeInner::Realtime(rt) => AfterInner::Realtime {
                sleep: rt.sleep(duration),
            },
            TimeInner::Manual(manual) => {
                let (tx, rx) = oneshot::channel();
                manual.register(
                    id,
                    Trigger::After {
                        duration,
                        tx: Some(tx),
                    },
                );
                AfterInner::Manual { rx, done: false }
            }
        };
        Self { inner }
    }
}

impl Future for TimeAfter {
    type Output = DateTime<Utc>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<DateTime<Utc>> {
        match self.project().inner.project() {
            AfterInnerProj::Realtime { sleep } => sleep.poll(cx).map(|()| Utc::now()),
            AfterInnerProj::Manual { rx, done } => {
                if *done {
                    return Poll::Pending;
                }
                match Pin::new(rx).poll(cx) {
                    Poll::Ready(Ok(stamp)) => {
                        *done = true;
                        Poll::Ready(stamp)
                    }
                    // Abandoned by unregister: no fire, no error.
                    Poll::Ready(Err(_)) => {
                        *done = true;
                        Poll::Pending
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

/// A future that resolves once the caller's sleep is released.
///
/// Created by [`TimeHandle::sleep`](crate::TimeHandle::sleep). Same
/// abandonment behavior as [`TimeAfter`].
#[pin_project]
pub struct TimeSleep {
    #[pin]
    inner: SleepInner,
}

#[pin_project(project = SleepInnerProj)]
enum SleepInner {
    Realtime {
        #[pin]
        sleep: Sleep,
    },
    Manual {
        rx: oneshot::Receiver<()>,
        done: bool,
    },
}

impl TimeSleep {
    pub(crate) fn new(inner: &TimeInner, duration: Duration, id: EventId) -> Self {
        let inner = match inner {
            TimeInner::Realtime(rt) => SleepInner::Realtime {
                sleep: rt.sleep(duration),
            },
            TimeInner::Manual(manual) => {
                let (tx, rx) = oneshot::channel();
                manual.register(id, Trigger::Sleep { tx: Some(tx) });
                SleepInner::Manual { rx, done: false }
            }
        };
        Self { inner }
    }
}

impl Future for TimeSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.project().inner.project() {
            SleepInnerProj::Realtime { sleep } => sleep.poll(cx),
            SleepInnerProj::Manual { rx, done } => {
                if *done {
                    return Poll::Pending;
                }
                match Pin::new(rx).poll(cx) {
                    Poll::Ready(Ok(())) => {
                        *done = true;
                        Poll::Ready(())
                    }
                    Poll::Ready(Err(_)) => {
                        *done = true;
                        Poll::Pending
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::TimeHandle;
    use futures::task::noop_waker;

    use std::future::Future;
    use std::task::Context;
    use std::time::Duration;

    #[test]
    fn abandoned_sleep_stays_pending() {
        let (time, ctrl) = TimeHandle::manual();

        let mut sleep = std::pin::pin!(time.sleep(Duration::from_secs(60), 1));
        ctrl.unregister([1u64]);

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        // The abandoned registration never resolves: no release, no error.
        assert!(sleep.as_mut().poll(&mut cx).is_pending());
        assert!(sleep.as_mut().poll(&mut cx).is_pending());
    }

    #[test]
    fn released_sleep_resolves_on_first_poll() {
        let (time, ctrl) = TimeHandle::manual();

        // Credit declared first: registration fires during construction.
        ctrl.trigger([1u64]);
        let mut sleep = std::pin::pin!(time.sleep(Duration::from_secs(60), 1));

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(sleep.as_mut().poll(&mut cx).is_ready());
    }
}
