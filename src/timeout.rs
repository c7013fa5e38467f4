//! Deadlines for futures.
//!
//! [`timeout`] races a future against a timer. The timer is armed when
//! `timeout` is called, not when the returned future is first polled. If the
//! inner future settles first, the timer is dropped with the [`Timeout`]
//! future; if the deadline elapses first, the inner future is dropped and
//! [`TimeoutError`] is returned.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tempora::timeout::{timeout_with, TimeoutOptions};
//! use std::time::Duration;
//!
//! let never = std::future::pending::<()>();
//! let error = timeout_with(
//!     never,
//!     Duration::from_millis(50),
//!     TimeoutOptions::default().with_message("Request timed out"),
//! )
//! .await
//! .unwrap_err();
//! assert_eq!(error.to_string(), "Request timed out");
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use pin_project_lite::pin_project;
use tracing::debug;

use crate::error::{DEFAULT_TIMEOUT_MESSAGE, TimeoutError};
use crate::race::{Either, Race, race};
use crate::timer::{Timer, default_timer};

// =============================================================================
// Options
// =============================================================================

/// Configuration for [`timeout_with`].
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimeoutOptions {
    /// Message carried by the [`TimeoutError`].
    pub message: String,
    /// Clock used for the deadline.
    #[cfg_attr(feature = "serde", serde(skip, default = "default_timer"))]
    pub timer: Arc<dyn Timer>,
}

impl TimeoutOptions {
    /// Sets the error message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Replaces the timer.
    #[must_use]
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
            timer: default_timer(),
        }
    }
}

impl fmt::Debug for TimeoutOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TimeoutOptions")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Timeout future
// =============================================================================

pin_project! {
    /// Future returned by [`timeout`] and [`timeout_with`].
    #[must_use = "futures do nothing unless polled"]
    pub struct Timeout<F> {
        #[pin]
        race: Race<F, BoxFuture<'static, ()>>,
        duration: Duration,
        message: Option<String>,
    }
}

impl<F> fmt::Debug for Timeout<F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Timeout")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl<F: Future> Future for Timeout<F> {
    type Output = Result<F::Output, TimeoutError>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.race.poll(context) {
            Poll::Ready(Either::Left(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Either::Right(())) => {
                let message = this
                    .message
                    .take()
                    .unwrap_or_else(|| DEFAULT_TIMEOUT_MESSAGE.to_string());
                debug!(duration = ?this.duration, reason = %message, "deadline elapsed");
                Poll::Ready(Err(TimeoutError::with_message(*this.duration, message)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Limits `future` to `duration`, failing with the message `"Timeout"`.
///
/// A zero duration still polls `future` once, so an immediately ready
/// future wins; anything else times out.
pub fn timeout<F: Future>(future: F, duration: Duration) -> Timeout<F> {
    timeout_with(future, duration, TimeoutOptions::default())
}

/// Limits `future` to `duration` using `options`.
pub fn timeout_with<F: Future>(
    future: F,
    duration: Duration,
    options: TimeoutOptions,
) -> Timeout<F> {
    let deadline = options.timer.sleep(duration);
    Timeout {
        race: race(future, deadline),
        duration,
        message: Some(options.message),
    }
}

/// Limits `future` to `duration`, resolving with `fallback()` on expiry.
pub async fn timeout_or_else<F, G>(future: F, duration: Duration, fallback: G) -> F::Output
where
    F: Future,
    G: FnOnce() -> F::Output,
{
    match timeout(future, duration).await {
        Ok(value) => value,
        Err(_) => fallback(),
    }
}

// =============================================================================
// Extension trait
// =============================================================================

/// Adds deadline methods to every future.
pub trait TimeoutExt: Future + Sized {
    /// See [`timeout`].
    fn timeout(self, duration: Duration) -> Timeout<Self> {
        timeout(self, duration)
    }

    /// See [`timeout_with`].
    fn timeout_with(self, duration: Duration, options: TimeoutOptions) -> Timeout<Self> {
        timeout_with(self, duration, options)
    }
}

impl<F: Future> TimeoutExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test(start_paused = true)]
    async fn ready_future_wins() {
        assert_eq!(timeout(async { 7 }, Duration::from_millis(10)).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn inner_error_passes_through() {
        let result = timeout(async { Err::<(), _>("inner") }, Duration::from_millis(10)).await;
        assert_eq!(result, Ok(Err("inner")));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_future_times_out_with_default_message() {
        let error = timeout(std::future::pending::<()>(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Timeout");
        assert_eq!(error.duration, Duration::from_millis(50));
    }

    #[rstest]
    #[case(Duration::ZERO)]
    #[case(Duration::from_nanos(1))]
    #[tokio::test(start_paused = true)]
    async fn tiny_deadline_times_out_pending_future(#[case] duration: Duration) {
        let slow = tokio::time::sleep(Duration::from_millis(5));
        assert!(timeout(slow, duration).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_deadline_still_accepts_ready_future() {
        assert_eq!(timeout(async { 1 }, Duration::ZERO).await, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_armed_at_call_time() {
        let guarded = timeout(std::future::pending::<()>(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(100)).await;
        let start = tokio::time::Instant::now();
        assert!(guarded.await.is_err());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_replaces_timeout() {
        let value = timeout_or_else(
            std::future::pending::<i32>(),
            Duration::from_millis(5),
            || -1,
        )
        .await;
        assert_eq!(value, -1);
    }

    #[tokio::test(start_paused = true)]
    async fn extension_trait_uses_custom_message() {
        let error = std::future::pending::<()>()
            .timeout_with(
                Duration::from_millis(5),
                TimeoutOptions::default().with_message("Request timed out"),
            )
            .await
            .unwrap_err();
        assert_eq!(error.message, "Request timed out");
    }

    #[rstest]
    fn options_debug_shows_message() {
        let debug = format!("{:?}", TimeoutOptions::default());
        assert!(debug.contains("Timeout"));
    }
}
