#![cfg(feature = "timeout")]

//! Integration tests for `timeout`, `timeout_with` and `TimeoutExt`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rstest::rstest;

use tempora::error::TimeoutError;
use tempora::timeout::{TimeoutExt, TimeoutOptions, timeout, timeout_with};

// =============================================================================
// Deadline Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn custom_message_after_fifty_milliseconds() {
    let start = tokio::time::Instant::now();
    let result = timeout_with(
        std::future::pending::<()>(),
        Duration::from_millis(50),
        TimeoutOptions::default().with_message("Request timed out"),
    )
    .await;

    assert_eq!(
        result,
        Err(TimeoutError::with_message(
            Duration::from_millis(50),
            "Request timed out"
        ))
    );
    assert_eq!(start.elapsed(), Duration::from_millis(50));
}

#[rstest]
#[case(10, 50, true)]
#[case(50, 10, false)]
#[tokio::test(start_paused = true)]
async fn faster_side_wins(
    #[case] work_millis: u64,
    #[case] limit_millis: u64,
    #[case] succeeds: bool,
) {
    let work = async move {
        tokio::time::sleep(Duration::from_millis(work_millis)).await;
        "done"
    };
    let result = timeout(work, Duration::from_millis(limit_millis)).await;
    assert_eq!(result.is_ok(), succeeds);
}

#[tokio::test(start_paused = true)]
async fn success_leaves_no_pending_deadline() {
    let result = timeout(async { 5 }, Duration::from_millis(100)).await;
    assert_eq!(result, Ok(5));

    // Nothing fires after the race settled.
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test(start_paused = true)]
async fn losing_work_is_dropped() {
    struct Flag(Arc<AtomicBool>);
    impl Drop for Flag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let dropped = Arc::new(AtomicBool::new(false));
    let flag = Flag(dropped.clone());
    let work = async move {
        let _flag = flag;
        std::future::pending::<()>().await;
    };

    assert!(work.timeout(Duration::from_millis(10)).await.is_err());
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn spawned_work_keeps_running_after_timeout() {
    let finished = Arc::new(AtomicBool::new(false));
    let marker = finished.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        marker.store(true, Ordering::SeqCst);
    });

    assert!(timeout(handle, Duration::from_millis(10)).await.is_err());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[rstest]
fn error_display_is_message() {
    let error = TimeoutError::new(Duration::from_millis(1));
    assert_eq!(error.to_string(), "Timeout");
}
