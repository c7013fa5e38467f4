#![cfg(feature = "map")]

//! Integration tests for `map_concurrent`, `map_concurrent_stream` and
//! `for_each_concurrent`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use proptest::prelude::*;
use rstest::rstest;

use tempora::error::{AbortError, TaskError};
use tempora::map::{MapOptions, for_each_concurrent, map_concurrent, map_concurrent_stream};
use tempora::signal::AbortSignal;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn second_item_error_rejects_whole_map() {
    let result = map_concurrent(
        [1, 2, 3],
        |value, _| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if value == 2 {
                Err(format!("item {value} failed"))
            } else {
                Ok(value * 2)
            }
        },
        MapOptions::default().with_concurrency(2),
    )
    .await;

    assert_eq!(result, Err(TaskError::Failed("item 2 failed".to_string())));
}

#[rstest]
#[case(1, 300)]
#[case(2, 200)]
#[case(3, 100)]
#[case(0, 100)]
#[tokio::test(start_paused = true)]
async fn concurrency_shapes_total_time(#[case] concurrency: usize, #[case] expected_millis: u64) {
    let start = tokio::time::Instant::now();
    let result: Result<Vec<i32>, TaskError<()>> = map_concurrent(
        [1, 2, 3],
        |value, _| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(value)
        },
        MapOptions::default().with_concurrency(concurrency),
    )
    .await;

    assert_eq!(result, Ok(vec![1, 2, 3]));
    assert_eq!(start.elapsed(), Duration::from_millis(expected_millis));
}

#[tokio::test(start_paused = true)]
async fn signal_timeout_aborts_long_map() {
    let started = AtomicUsize::new(0);
    let result: Result<Vec<u32>, TaskError<()>> = map_concurrent(
        0..100,
        |value, _| {
            started.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(value)
            }
        },
        MapOptions::default()
            .with_concurrency(4)
            .with_signal(AbortSignal::timeout(Duration::from_millis(55))),
    )
    .await;

    assert!(matches!(result, Err(TaskError::Aborted(_))));
    assert!(started.load(Ordering::SeqCst) < 100);
}

#[tokio::test(start_paused = true)]
async fn never_signal_does_not_interfere() {
    let result: Result<Vec<u32>, TaskError<()>> = map_concurrent(
        0..10,
        |value, _| async move { Ok(value) },
        MapOptions::default().with_signal(AbortSignal::never()),
    )
    .await;
    assert_eq!(result, Ok((0..10).collect()));
}

#[tokio::test(start_paused = true)]
async fn stream_source_with_delays() {
    let source = stream::iter(0..5_u64).then(|value| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        value
    });

    let result: Result<Vec<u64>, TaskError<()>> = map_concurrent_stream(
        source,
        |value, index| async move {
            tokio::time::sleep(Duration::from_millis(50 - value * 10)).await;
            Ok(value + u64::try_from(index).unwrap_or(0))
        },
        MapOptions::default().with_concurrency(2),
    )
    .await;

    assert_eq!(result, Ok(vec![0, 2, 4, 6, 8]));
}

#[tokio::test(start_paused = true)]
async fn for_each_surfaces_abort_reason() {
    let signal = AbortSignal::timeout(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(1)).await;

    let result: Result<(), TaskError<()>> = for_each_concurrent(
        [1, 2, 3],
        |_, _| async { Ok(()) },
        MapOptions::default().with_signal(signal),
    )
    .await;

    assert!(matches!(result, Err(TaskError::Aborted(ref error)) if error != &AbortError::new()));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Output order equals input order for any completion order, and the
    /// number of mapper futures in flight never exceeds the limit.
    #[test]
    fn prop_order_preserved_and_limit_respected(
        delays in prop::collection::vec(0u64..50, 0..40),
        concurrency in 0usize..6,
    ) {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let result: Result<Vec<u64>, TaskError<()>> = paused_runtime().block_on(map_concurrent(
            delays.clone(),
            |delay, _| {
                let (in_flight, peak) = (&in_flight, &peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(delay)
                }
            },
            MapOptions::default().with_concurrency(concurrency),
        ));

        prop_assert_eq!(result, Ok(delays.clone()));
        if concurrency > 0 {
            prop_assert!(peak.load(Ordering::SeqCst) <= concurrency);
        }
    }
}
