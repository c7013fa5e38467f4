//! One-shot timer primitives.
//!
//! - [`delay`]: run a callback once after a duration
//! - [`defer`]: run a callback on the next scheduling opportunity
//! - [`sleep`]: wait for a duration
//! - [`sleep_with_signal`]: wait for a duration unless aborted first
//!
//! # Examples
//!
//! ```rust,ignore
//! use tempora::delay::delay;
//! use std::time::Duration;
//!
//! let handle = delay(Duration::from_millis(100), || println!("fired"));
//! handle.cancel(); // never prints
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::error::AbortError;
use crate::signal::AbortSignal;
use crate::timer::{Timer, TimerHandle, default_timer};

/// Schedules `callback` to run once after `duration`.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn delay<F>(duration: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    delay_with(&default_timer(), duration, callback)
}

/// Schedules `callback` on `timer` to run once after `duration`.
pub fn delay_with<F>(timer: &Arc<dyn Timer>, duration: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let sleep = timer.sleep(duration);
    timer.spawn(
        async move {
            sleep.await;
            callback();
        }
        .boxed(),
    )
}

/// Schedules `callback` on the next scheduling opportunity.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn defer<F>(callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    delay(Duration::ZERO, callback)
}

/// Waits for `duration`.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Waits for `duration`, returning early if `signal` aborts.
///
/// # Errors
///
/// Returns the signal's [`AbortError`] if it is aborted before or during
/// the wait.
pub async fn sleep_with_signal(duration: Duration, signal: &AbortSignal) -> Result<(), AbortError> {
    signal.check()?;
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        error = signal.aborted() => Err(error),
    }
}
