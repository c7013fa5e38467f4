//! Retry with exponential backoff.
//!
//! [`retry`] invokes an operation until it succeeds, the retry budget is
//! spent, or the abort signal fires. Between attempts it waits
//! `min(max_timeout, floor(min_timeout * factor^attempt))`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tempora::retry::{retry, RetryOptions};
//! use std::time::Duration;
//!
//! let options = RetryOptions::default()
//!     .with_retries(5)
//!     .with_min_timeout(Duration::from_millis(10));
//!
//! let body = retry(|_context| async { fetch().await }, options).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::TaskError;
use crate::race::{Either, race};
use crate::signal::AbortSignal;
use crate::timer::{Timer, default_timer};

// =============================================================================
// Options
// =============================================================================

/// Configuration for [`retry`].
///
/// | field         | default |
/// |---------------|---------|
/// | `retries`     | 3       |
/// | `factor`      | 2.0     |
/// | `min_timeout` | 100ms   |
/// | `max_timeout` | 2000ms  |
/// | `signal`      | none    |
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryOptions {
    /// Attempts allowed after the first one.
    pub retries: u32,
    /// Backoff multiplier.
    pub factor: f64,
    /// Delay before the first retry.
    pub min_timeout: Duration,
    /// Ceiling for every backoff delay.
    pub max_timeout: Duration,
    /// Cancellation token checked before each attempt and during backoff.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub signal: Option<AbortSignal>,
    /// Clock and sleep source.
    #[cfg_attr(feature = "serde", serde(skip, default = "default_timer"))]
    pub timer: Arc<dyn Timer>,
}

impl RetryOptions {
    /// Sets the retry budget.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Sets the initial backoff delay.
    #[must_use]
    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Sets the backoff ceiling.
    #[must_use]
    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    /// Attaches an abort signal.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Replaces the timer.
    #[must_use]
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    /// Returns the delay waited after the failure of attempt `attempt` (0-based).
    ///
    /// `min(max_timeout, floor(min_timeout_ms * factor^attempt))` milliseconds.
    /// Non-finite or negative intermediate values fall back to the ceiling
    /// and zero respectively.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let min_millis = self.min_timeout.as_secs_f64() * 1000.0;
        let max_millis = self.max_timeout.as_secs_f64() * 1000.0;
        let millis = (min_millis * self.factor.powi(exponent)).floor();

        if millis.is_nan() || millis >= max_millis {
            return self.max_timeout;
        }
        if millis <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_millis(millis as u64)
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            factor: 2.0,
            min_timeout: Duration::from_millis(100),
            max_timeout: Duration::from_millis(2000),
            signal: None,
            timer: default_timer(),
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RetryOptions")
            .field("retries", &self.retries)
            .field("factor", &self.factor)
            .field("min_timeout", &self.min_timeout)
            .field("max_timeout", &self.max_timeout)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RetryContext
// =============================================================================

/// Information about the attempt being run, passed to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// 0-based attempt number.
    pub attempt: u32,
    /// Attempts still available after this one.
    pub retries_left: u32,
}

impl RetryContext {
    /// Returns `true` for the initial attempt.
    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.attempt == 0
    }
}

// =============================================================================
// retry
// =============================================================================

/// Runs `operation` until it succeeds, retrying every error.
///
/// The operation is invoked at most `retries + 1` times. On exhaustion the
/// most recent error is returned as [`TaskError::Failed`]; earlier errors
/// are discarded.
///
/// # Errors
///
/// - [`TaskError::Failed`] with the last attempt's error once the budget is spent
/// - [`TaskError::Aborted`] if the signal is aborted before an attempt or
///   during a backoff wait
pub async fn retry<A, E, F, Fut>(operation: F, options: RetryOptions) -> Result<A, TaskError<E>>
where
    F: FnMut(RetryContext) -> Fut,
    Fut: Future<Output = Result<A, E>>,
{
    retry_if(operation, options, |_, _| true).await
}

/// Like [`retry`], but consults `should_retry` after every failure.
///
/// Returning `false` ends the loop with that error, even when retries
/// remain. The predicate is not called for the final attempt.
///
/// # Errors
///
/// See [`retry`].
pub async fn retry_if<A, E, F, Fut, P>(
    mut operation: F,
    options: RetryOptions,
    mut should_retry: P,
) -> Result<A, TaskError<E>>
where
    F: FnMut(RetryContext) -> Fut,
    Fut: Future<Output = Result<A, E>>,
    P: FnMut(&E, &RetryContext) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        if let Some(signal) = &options.signal {
            if let Err(error) = signal.check() {
                debug!(attempt, reason = error.message(), "retry aborted before attempt");
                return Err(TaskError::Aborted(error));
            }
        }

        let context = RetryContext {
            attempt,
            retries_left: options.retries.saturating_sub(attempt),
        };
        trace!(attempt, "retry attempt started");

        let error = match operation(context).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if attempt >= options.retries {
            debug!(attempts = attempt + 1, "retries exhausted");
            return Err(TaskError::Failed(error));
        }
        if !should_retry(&error, &context) {
            debug!(attempt, "retry predicate rejected error");
            return Err(TaskError::Failed(error));
        }

        let backoff = options.backoff_delay(attempt);
        debug!(
            attempt,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            "retry attempt failed, backing off"
        );
        attempt += 1;

        match &options.signal {
            Some(signal) => {
                let waited = race(options.timer.sleep(backoff), signal.aborted()).await;
                if let Either::Right(error) = waited {
                    debug!(attempt, reason = error.message(), "retry aborted during backoff");
                    return Err(TaskError::Aborted(error));
                }
            }
            None => options.timer.sleep(backoff).await,
        }
    }
}
