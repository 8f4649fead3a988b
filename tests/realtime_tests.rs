use manual_time::TimeHandle;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn now_tracks_the_system_clock() {
    let time = TimeHandle::realtime();
    let before = chrono::Utc::now();
    let now = time.now();
    let after = chrono::Utc::now();

    assert!(now >= before);
    assert!(now <= after);
}

#[tokio::test]
async fn sleep_waits_the_duration() {
    let time = TimeHandle::realtime();
    let start = std::time::Instant::now();

    time.sleep(Duration::from_millis(50), 1).await;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(40));
    assert!(elapsed < Duration::from_millis(500));
}

#[tokio::test]
async fn after_resolves_with_a_timestamp() {
    let time = TimeHandle::realtime();
    let before = chrono::Utc::now();

    let stamp = time.after(Duration::from_millis(20), 1).await;
    assert!(stamp >= before);
}

#[tokio::test]
async fn ticker_ticks_repeatedly() {
    let time = TimeHandle::realtime();
    let mut ticker = time.new_ticker(Duration::from_millis(10), 1);

    let first = ticker.tick().await;
    let second = ticker.tick().await;
    assert!(second >= first);
}

#[tokio::test]
async fn stopped_ticker_stops_ticking() {
    let time = TimeHandle::realtime();
    let mut ticker = time.new_ticker(Duration::from_millis(5), 1);

    ticker.tick().await;
    ticker.stop();

    let tick = tokio::time::timeout(Duration::from_millis(30), ticker.tick()).await;
    assert!(tick.is_err());
}

#[tokio::test]
async fn timer_fires_once() {
    let time = TimeHandle::realtime();
    let mut timer = time.new_timer(Duration::from_millis(20), 1);

    timer.recv().await;

    // Already fired: the channel stays silent.
    let again = tokio::time::timeout(Duration::from_millis(30), timer.recv()).await;
    assert!(again.is_err());
}

#[tokio::test]
async fn timer_stop_reports_was_active() {
    let time = TimeHandle::realtime();
    let mut timer = time.new_timer(Duration::from_secs(60), 1);

    assert!(timer.stop());
    assert!(!timer.stop());
}

#[tokio::test]
async fn after_func_runs_and_stop_prevents() {
    let time = TimeHandle::realtime();

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _running = time.after_func(
        Duration::from_millis(10),
        {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            }
        },
        1,
    );

    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("callback should run")
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stopped_calls = Arc::new(AtomicUsize::new(0));
    let mut stopped = time.after_func(
        Duration::from_millis(20),
        {
            let calls = stopped_calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        },
        2,
    );
    assert!(stopped.stop());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stopped_calls.load(Ordering::SeqCst), 0);
}
