use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

/// Why a [`TimeContext`] closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CancelReason {
    /// The deadline fired.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// The context (or an ancestor) was cancelled explicitly.
    #[error("context canceled")]
    Canceled,
}

/// A cancellable deadline context.
///
/// Created by [`TimeHandle::with_deadline`](crate::TimeHandle::with_deadline)
/// and [`TimeHandle::with_timeout`](crate::TimeHandle::with_timeout), or as
/// the never-closing root via [`TimeContext::background`].
///
/// Closing is idempotent: the first reason to arrive is retained and later
/// close attempts are no-ops. A child whose parent closes first reports the
/// parent's reason, not its own expiry.
#[derive(Clone)]
pub struct TimeContext {
    pub(crate) shared: Arc<ContextShared>,
}

pub(crate) struct ContextShared {
    deadline: Option<DateTime<Utc>>,
    reason: Mutex<Option<CancelReason>>,
    closed_tx: watch::Sender<bool>,
}

impl ContextShared {
    fn new(deadline: Option<DateTime<Utc>>) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            deadline,
            reason: Mutex::new(None),
            closed_tx,
        }
    }

    /// Close with `reason` unless already closed. First reason wins.
    pub(crate) fn close(&self, reason: CancelReason) {
        let mut retained = self.reason.lock();
        if retained.is_none() {
            *retained = Some(reason);
            let _ = self.closed_tx.send(true);
        }
    }

    async fn done(&self) {
        let mut rx = self.closed_tx.subscribe();
        // The sender lives in self, so this can only resolve via close().
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl TimeContext {
    /// The root context: no deadline, never closes.
    pub fn background() -> Self {
        Self {
            shared: Arc::new(ContextShared::new(None)),
        }
    }

    /// Wait until the context closes. Pends forever on [`background`](Self::background).
    pub async fn done(&self) {
        self.shared.done().await
    }

    /// The retained close reason, or `None` while the context is open.
    pub fn err(&self) -> Option<CancelReason> {
        *self.shared.reason.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.err().is_some()
    }

    /// The deadline this context was created with. `None` for the root.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.shared.deadline
    }

    /// Derive a child context and spawn its observer task. The observer
    /// watches whichever of {parent closing, child closing} happens first
    /// and propagates the parent's reason when the parent wins. When
    /// `expire_after` is given it also races a real timer that closes the
    /// child with [`CancelReason::DeadlineExceeded`].
    pub(crate) fn child(
        parent: &TimeContext,
        deadline: DateTime<Utc>,
        expire_after: Option<Duration>,
    ) -> (TimeContext, CancelHandle) {
        let shared = Arc::new(ContextShared::new(Some(deadline)));
        let ctx = TimeContext {
            shared: Arc::clone(&shared),
        };
        let cancel = CancelHandle {
            shared: Arc::clone(&shared),
        };

        let parent = parent.clone();
        let child = shared;
        tokio::spawn(async move {
            match expire_after {
                Some(timeout) => {
                    tokio::select! {
                        _ = parent.done() => {
                            child.close(parent.err().unwrap_or(CancelReason::Canceled));
                        }
                        _ = child.done() => {}
                        _ = tokio::time::sleep(timeout) => {
                            child.close(CancelReason::DeadlineExceeded);
                        }
                    }
                }
                None => {
                    tokio::select! {
                        _ = parent.done() => {
                            child.close(parent.err().unwrap_or(CancelReason::Canceled));
                        }
                        _ = child.done() => {}
                    }
                }
            }
        });

        (ctx, cancel)
    }
}

impl std::fmt::Debug for TimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeContext")
            .field("deadline", &self.deadline())
            .field("err", &self.err())
            .finish()
    }
}

/// Cancels the associated [`TimeContext`] with [`CancelReason::Canceled`].
///
/// Calling [`cancel`](Self::cancel) more than once, or after the context
/// already closed for another reason, is a no-op.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<ContextShared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.shared.close(CancelReason::Canceled);
    }
}
