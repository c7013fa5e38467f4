//! Throttled callbacks.
//!
//! A throttled callback runs at most once per `wait`. Unlike
//! [`debounce`](crate::debounce), a steady stream of calls does not postpone
//! it forever: the window is measured from the previous invocation, not from
//! the previous call.
//!
//! ```text
//! wait = 100ms, calls every 30ms
//! calls:   x  x  x  x  x  x  x  x
//! fires:   L        T        T     T     (L = leading, T = trailing)
//!          0       100      200   300
//! ```
//!
//! Calls inside a window overwrite each other; the last one runs when the
//! window closes (if `trailing`), and that invocation opens the next window.
//! A call landing exactly on a window's deadline still belongs to that
//! window.
//! Over a span `T` of continuous calls the callback runs at most
//! `ceil(T / wait) + 1` times.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::gate::{Batch, Edges, Gate, Mode, fan_out, keep_latest};
use crate::timer::{Timer, default_timer};

// =============================================================================
// Options
// =============================================================================

/// Edge configuration for [`throttle`] and [`throttle_async`].
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThrottleOptions {
    /// Run the first call of a fresh window immediately. Default `true`.
    pub leading: bool,
    /// Run the last coalesced call when the window closes. Default `true`.
    pub trailing: bool,
    /// Clock and task spawner.
    #[cfg_attr(feature = "serde", serde(skip, default = "default_timer"))]
    pub timer: Arc<dyn Timer>,
}

impl ThrottleOptions {
    /// Enables or disables the leading edge.
    #[must_use]
    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    /// Enables or disables the trailing edge.
    #[must_use]
    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    /// Replaces the timer.
    #[must_use]
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    const fn edges(&self) -> Edges {
        Edges {
            leading: self.leading,
            trailing: self.trailing,
        }
    }
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            leading: true,
            trailing: true,
            timer: default_timer(),
        }
    }
}

impl fmt::Debug for ThrottleOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ThrottleOptions")
            .field("leading", &self.leading)
            .field("trailing", &self.trailing)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Throttled
// =============================================================================

/// A throttled synchronous callback, created by [`throttle`].
pub struct Throttled<A> {
    gate: Arc<Gate<A>>,
}

/// Wraps `callback` so it runs at most once per `wait`.
///
/// # Panics
///
/// [`Throttled::call`] panics when used outside a tokio runtime with the
/// default timer.
///
/// # Examples
///
/// ```rust,ignore
/// use tempora::throttle::{throttle, ThrottleOptions};
/// use std::time::Duration;
///
/// let report = throttle(
///     |position: (f64, f64)| println!("at {position:?}"),
///     Duration::from_millis(100),
///     ThrottleOptions::default(),
/// );
///
/// for step in 0..1000 {
///     report.call((f64::from(step), 0.0));
/// }
/// ```
pub fn throttle<A, F>(callback: F, wait: Duration, options: ThrottleOptions) -> Throttled<A>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    let edges = options.edges();
    Throttled {
        gate: Gate::new(
            Arc::new(callback),
            keep_latest,
            wait,
            edges,
            Mode::Throttle,
            options.timer,
        ),
    }
}

impl<A: Send + 'static> Throttled<A> {
    /// Records a call with `args`.
    pub fn call(&self, args: A) {
        self.gate.call(args);
    }

    /// Drops the pending call and ends the current window.
    ///
    /// The next call is treated as the first call of a fresh window.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    /// Runs the pending call immediately.
    ///
    /// The next window is measured from this invocation, so a call right
    /// after a flush waits for the window instead of running as a leading
    /// call. Returns `true` if a call was pending.
    pub fn flush(&self) -> bool {
        self.gate.flush()
    }

    /// Returns `true` while a trailing call is waiting for its window to close.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.gate.is_pending()
    }

    /// Returns when the callback last ran.
    #[must_use]
    pub fn last_invoked(&self) -> Option<Instant> {
        self.gate.last_fired()
    }
}

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<A> fmt::Debug for Throttled<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Throttled")
            .field("gate", &self.gate)
            .finish()
    }
}

// =============================================================================
// AsyncThrottled
// =============================================================================

/// A throttled async callback, created by [`throttle_async`].
pub struct AsyncThrottled<A, T> {
    gate: Arc<Gate<Batch<A, T>>>,
}

/// Wraps an async `callback` with throttle semantics.
///
/// A leading-edge call resolves with its own invocation's result. Calls
/// coalesced into a window all resolve with the trailing invocation's
/// result. Calls no invocation consumes resolve to `None`.
pub fn throttle_async<A, T, F, Fut>(
    callback: F,
    wait: Duration,
    options: ThrottleOptions,
) -> AsyncThrottled<A, T>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let edges = options.edges();
    AsyncThrottled {
        gate: Gate::new(
            fan_out(callback, options.timer.clone()),
            Batch::merge,
            wait,
            edges,
            Mode::Throttle,
            options.timer,
        ),
    }
}

impl<A, T> AsyncThrottled<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    /// Records a call and returns a future for its eventual result.
    pub fn call(&self, args: A) -> impl Future<Output = Option<T>> + Send + use<A, T> {
        let (batch, receiver) = Batch::single(args);
        self.gate.call(batch);
        async move { receiver.await.ok() }
    }

    /// Drops the pending call; its waiters resolve to `None`.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    /// Starts the pending invocation immediately; the next window is
    /// measured from it.
    pub fn flush(&self) -> bool {
        self.gate.flush()
    }

    /// Returns `true` while a trailing call is waiting for its window to close.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.gate.is_pending()
    }
}

impl<A, T> Clone for AsyncThrottled<A, T> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<A, T> fmt::Debug for AsyncThrottled<A, T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AsyncThrottled")
            .field("gate", &self.gate)
            .finish()
    }
}
