#![cfg(feature = "debounce")]

//! Integration tests for `debounce` and `debounce_async`.
//!
//! Includes a custom [`Timer`] to check that the debouncer schedules work
//! only through the timer it was given.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use proptest::prelude::*;
use rstest::rstest;

use tempora::debounce::{DebounceOptions, debounce, debounce_async};
use tempora::timer::{Timer, TimerHandle, TokioTimer};

const WAIT: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct CountingTimer {
    inner: TokioTimer,
    spawned: AtomicUsize,
}

impl Timer for CountingTimer {
    fn now(&self) -> tokio::time::Instant {
        self.inner.now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.inner.sleep(duration)
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) -> TimerHandle {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(task)
    }
}

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
async fn search_box_saves_final_text_once() {
    let saved = Arc::new(Mutex::new(Vec::new()));
    let sink = saved.clone();
    let save = debounce(
        move |text: String| sink.lock().push(text),
        Duration::from_millis(300),
        DebounceOptions::default(),
    );

    for prefix in ["h", "he", "hel", "hell", "hello"] {
        save.call(prefix.to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(*saved.lock(), vec!["hello".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn one_window_task_per_burst() {
    let timer = Arc::new(CountingTimer::default());
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let debounced = debounce(
        move |(): ()| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        WAIT,
        DebounceOptions::default().with_timer(timer.clone()),
    );

    for _ in 0..20 {
        debounced.call(());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(WAIT * 2).await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(timer.spawned.load(Ordering::SeqCst), 1);
}

#[rstest]
#[case(false, true, vec![3])]
#[case(true, true, vec![1, 3])]
#[case(true, false, vec![1])]
#[case(false, false, vec![])]
#[tokio::test(start_paused = true)]
async fn edge_combinations(
    #[case] leading: bool,
    #[case] trailing: bool,
    #[case] expected: Vec<u32>,
) {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = fired.clone();
    let debounced = debounce(
        move |value: u32| sink.lock().push(value),
        WAIT,
        DebounceOptions::default()
            .with_leading(leading)
            .with_trailing(trailing),
    );

    debounced.call(1);
    debounced.call(2);
    debounced.call(3);
    tokio::time::sleep(WAIT * 2).await;

    assert_eq!(*fired.lock(), expected);
}

#[tokio::test(start_paused = true)]
async fn async_results_are_cloned_to_every_caller() {
    let debounced = debounce_async(
        |query: String| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            vec![format!("{query}-1"), format!("{query}-2")]
        },
        WAIT,
        DebounceOptions::default(),
    );

    let early = debounced.call("ru".to_string());
    let late = debounced.call("rust".to_string());
    let (early, late) = tokio::join!(early, late);

    let expected = Some(vec!["rust-1".to_string(), "rust-2".to_string()]);
    assert_eq!(early, expected);
    assert_eq!(late, expected);
}

#[tokio::test(start_paused = true)]
async fn async_bursts_resolve_independently() {
    let debounced = debounce_async(
        |value: u32| async move { value },
        WAIT,
        DebounceOptions::default(),
    );

    let first = debounced.call(1);
    tokio::time::sleep(WAIT * 2).await;
    let second = debounced.call(2);

    assert_eq!(first.await, Some(1));
    assert_eq!(second.await, Some(2));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Calls spaced closer than `wait` fire at most twice, and the trailing
    /// invocation always sees the last arguments.
    #[test]
    fn prop_burst_fires_at_most_twice(
        gaps in prop::collection::vec(0u64..100, 1..30),
        leading in any::<bool>(),
        trailing in any::<bool>(),
    ) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let calls = gaps.len();

        paused_runtime().block_on(async {
            let debounced = debounce(
                move |value: usize| sink.lock().push(value),
                WAIT,
                DebounceOptions::default()
                    .with_leading(leading)
                    .with_trailing(trailing),
            );
            for (index, gap) in gaps.iter().enumerate() {
                debounced.call(index);
                tokio::time::sleep(Duration::from_millis(*gap)).await;
            }
            tokio::time::sleep(WAIT * 2).await;
        });

        let fired = fired.lock().clone();
        prop_assert!(fired.len() <= 2);
        if leading {
            prop_assert_eq!(fired.first().copied(), Some(0));
        }
        if trailing && (!leading || calls > 1) {
            prop_assert_eq!(fired.last().copied(), Some(calls - 1));
        }
    }
}
