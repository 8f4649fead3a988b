use manual_time::{CancelReason, TimeContext, TimeHandle};

use std::time::Duration;

const DEADLINE_ID: u64 = 1;
const CHILD_ID: u64 = 2;

#[tokio::test]
async fn trigger_expires_the_context() {
    let (time, ctrl) = TimeHandle::manual();
    let root = TimeContext::background();

    let (ctx, _cancel) = time.with_timeout(&root, Duration::from_secs(30), DEADLINE_ID);
    assert!(!ctx.is_closed());

    ctrl.trigger([DEADLINE_ID]);

    ctx.done().await;
    assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
}

#[tokio::test]
async fn cancel_closes_with_canceled() {
    let (time, _ctrl) = TimeHandle::manual();
    let root = TimeContext::background();

    let (ctx, cancel) = time.with_timeout(&root, Duration::from_secs(30), DEADLINE_ID);
    cancel.cancel();

    ctx.done().await;
    assert_eq!(ctx.err(), Some(CancelReason::Canceled));
}

#[tokio::test]
async fn first_close_reason_is_retained() {
    let (time, ctrl) = TimeHandle::manual();
    let root = TimeContext::background();

    let (ctx, cancel) = time.with_timeout(&root, Duration::from_secs(30), DEADLINE_ID);

    cancel.cancel();
    // Later close attempts are no-ops, however often they arrive.
    ctrl.trigger([DEADLINE_ID]);
    ctrl.trigger([DEADLINE_ID]);
    cancel.cancel();

    ctx.done().await;
    assert_eq!(ctx.err(), Some(CancelReason::Canceled));
}

#[tokio::test]
async fn parent_cancellation_propagates_its_reason() {
    let (time, ctrl) = TimeHandle::manual();
    let root = TimeContext::background();

    let (parent, parent_cancel) = time.with_timeout(&root, Duration::from_secs(60), DEADLINE_ID);
    let (child, _child_cancel) = time.with_timeout(&parent, Duration::from_secs(30), CHILD_ID);

    parent_cancel.cancel();

    // The child closes with the parent's reason, not its own expiry.
    child.done().await;
    assert_eq!(child.err(), Some(CancelReason::Canceled));

    // Triggering the child's own deadline afterwards changes nothing.
    ctrl.trigger([CHILD_ID]);
    assert_eq!(child.err(), Some(CancelReason::Canceled));
}

#[tokio::test]
async fn parent_expiry_propagates_deadline_exceeded() {
    let (time, ctrl) = TimeHandle::manual();
    let root = TimeContext::background();

    let (parent, _parent_cancel) = time.with_timeout(&root, Duration::from_secs(60), DEADLINE_ID);
    let (child, _child_cancel) = time.with_timeout(&parent, Duration::from_secs(30), CHILD_ID);

    ctrl.trigger([DEADLINE_ID]);

    child.done().await;
    assert_eq!(child.err(), Some(CancelReason::DeadlineExceeded));
}

#[tokio::test]
async fn with_timeout_sets_deadline_from_now() {
    let (time, _ctrl) = TimeHandle::manual();
    let root = TimeContext::background();
    let t0 = time.now();

    let (ctx, _cancel) = time.with_timeout(&root, Duration::from_secs(30), DEADLINE_ID);

    assert_eq!(ctx.deadline(), Some(t0 + chrono::Duration::seconds(30)));
    assert_eq!(root.deadline(), None);
}

#[tokio::test]
async fn background_never_closes() {
    let root = TimeContext::background();

    let done = tokio::time::timeout(Duration::from_millis(20), root.done()).await;
    assert!(done.is_err());
    assert_eq!(root.err(), None);
}

#[tokio::test]
async fn unregistered_deadline_is_abandoned() {
    let (time, ctrl) = TimeHandle::manual();
    let root = TimeContext::background();

    let (ctx, _cancel) = time.with_timeout(&root, Duration::from_secs(30), DEADLINE_ID);

    ctrl.unregister([DEADLINE_ID]);
    ctrl.trigger([DEADLINE_ID]);

    // No fire ever reaches the abandoned context.
    let done = tokio::time::timeout(Duration::from_millis(20), ctx.done()).await;
    assert!(done.is_err());
    assert_eq!(ctx.err(), None);
}

#[tokio::test]
async fn realtime_timeout_expires() {
    let time = TimeHandle::realtime();
    let root = TimeContext::background();

    let (ctx, _cancel) = time.with_timeout(&root, Duration::from_millis(20), DEADLINE_ID);

    tokio::time::timeout(Duration::from_secs(1), ctx.done())
        .await
        .expect("context should expire");
    assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
}

#[tokio::test]
async fn realtime_cancel_beats_the_deadline() {
    let time = TimeHandle::realtime();
    let root = TimeContext::background();

    let (ctx, cancel) = time.with_timeout(&root, Duration::from_secs(60), DEADLINE_ID);
    cancel.cancel();

    ctx.done().await;
    assert_eq!(ctx.err(), Some(CancelReason::Canceled));
}
