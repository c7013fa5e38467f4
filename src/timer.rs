//! Scheduling capability used by every time-based utility.
//!
//! The utilities never call the runtime's timer directly. They hold an
//! `Arc<dyn Timer>` and ask it for the current instant, for a sleep future,
//! and to run a background task. [`TokioTimer`] is the default.
//!
//! # Implementation
//!
//! Background tasks are wrapped with [`futures::future::abortable`], so the
//! returned [`TimerHandle`] cancels the task without depending on the
//! runtime's own join handle type.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{AbortHandle, BoxFuture, FutureExt};
use tokio::time::Instant;

// =============================================================================
// Timer
// =============================================================================

/// A host scheduling primitive.
///
/// Implementations must be cheap to share; the utilities store them as
/// `Arc<dyn Timer>`.
pub trait Timer: Send + Sync + fmt::Debug {
    /// Returns the current instant on this timer's clock.
    fn now(&self) -> Instant;

    /// Returns a future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Runs `task` in the background, returning a handle that cancels it.
    fn spawn(&self, task: BoxFuture<'static, ()>) -> TimerHandle;
}

/// [`Timer`] backed by the tokio runtime.
///
/// Uses [`tokio::time`], so a paused test clock (`start_paused = true`)
/// drives every utility deterministically.
///
/// # Panics
///
/// [`Timer::spawn`] panics when called outside a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) -> TimerHandle {
        let (task, handle) = futures::future::abortable(task);
        tokio::spawn(task);
        TimerHandle::new(handle)
    }
}

/// Returns the default timer.
#[must_use]
pub fn default_timer() -> Arc<dyn Timer> {
    Arc::new(TokioTimer)
}

// =============================================================================
// TimerHandle
// =============================================================================

/// Handle to a task started with [`Timer::spawn`].
///
/// Dropping the handle leaves the task running; call [`cancel`](Self::cancel)
/// to stop it.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    handle: AbortHandle,
}

impl TimerHandle {
    /// Wraps an abort handle from [`futures::future::abortable`].
    #[must_use]
    pub const fn new(handle: AbortHandle) -> Self {
        Self { handle }
    }

    /// Cancels the task. If it has already run, this does nothing.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}
