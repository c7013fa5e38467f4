//! Debounced callbacks.
//!
//! A debounced callback coalesces a burst of calls into one invocation that
//! runs once the calls have been quiet for `wait`. With `leading` enabled,
//! the first call of a burst also runs immediately.
//!
//! ```text
//! calls:     a  b   c                    d
//! trailing:  ---------[wait]-> c         ---[wait]-> d
//! leading:   a                           d
//! ```
//!
//! Within one burst the callback runs at most twice: once on the leading
//! edge and once on the trailing edge. The trailing edge always uses the
//! arguments of the most recent call.
//!
//! - [`debounce`] wraps a synchronous callback
//! - [`debounce_async`] wraps an async callback; every caller coalesced into
//!   an invocation receives a clone of its result
//!
//! # Examples
//!
//! ```rust,ignore
//! use tempora::debounce::{debounce, DebounceOptions};
//! use std::time::Duration;
//!
//! let save = debounce(
//!     |text: String| println!("saving {text}"),
//!     Duration::from_millis(300),
//!     DebounceOptions::default(),
//! );
//!
//! save.call("h".into());
//! save.call("he".into());
//! save.call("hello".into()); // only "hello" is saved, 300ms later
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::gate::{Batch, Edges, Gate, Mode, fan_out, keep_latest};
use crate::timer::{Timer, default_timer};

// =============================================================================
// Options
// =============================================================================

/// Edge configuration for [`debounce`] and [`debounce_async`].
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DebounceOptions {
    /// Run on the first call of a burst. Default `false`.
    pub leading: bool,
    /// Run with the last arguments once the burst goes quiet. Default `true`.
    pub trailing: bool,
    /// Clock and task spawner.
    #[cfg_attr(feature = "serde", serde(skip, default = "default_timer"))]
    pub timer: Arc<dyn Timer>,
}

impl DebounceOptions {
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

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            leading: false,
            trailing: true,
            timer: default_timer(),
        }
    }
}

impl fmt::Debug for DebounceOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DebounceOptions")
            .field("leading", &self.leading)
            .field("trailing", &self.trailing)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Debounced
// =============================================================================

/// A debounced synchronous callback, created by [`debounce`].
///
/// Clones share the same pending call and timer.
pub struct Debounced<A> {
    gate: Arc<Gate<A>>,
}

/// Wraps `callback` so bursts of calls closer than `wait` collapse into one.
///
/// The callback runs on the caller's thread for leading edges and on a
/// runtime task for trailing edges.
///
/// # Panics
///
/// [`Debounced::call`] panics when used outside a tokio runtime with the
/// default timer.
pub fn debounce<A, F>(callback: F, wait: Duration, options: DebounceOptions) -> Debounced<A>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    let edges = options.edges();
    Debounced {
        gate: Gate::new(
            Arc::new(callback),
            keep_latest,
            wait,
            edges,
            Mode::Debounce,
            options.timer,
        ),
    }
}

impl<A: Send + 'static> Debounced<A> {
    /// Records a call with `args`.
    pub fn call(&self, args: A) {
        self.gate.call(args);
    }

    /// Drops the pending call, if any, and stops the timer.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    /// Runs the pending call immediately instead of waiting.
    ///
    /// Returns `true` if a call was pending.
    pub fn flush(&self) -> bool {
        self.gate.flush()
    }

    /// Returns `true` while a trailing call is waiting to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.gate.is_pending()
    }
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<A> fmt::Debug for Debounced<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Debounced")
            .field("gate", &self.gate)
            .finish()
    }
}

// =============================================================================
// AsyncDebounced
// =============================================================================

/// A debounced async callback, created by [`debounce_async`].
pub struct AsyncDebounced<A, T> {
    gate: Arc<Gate<Batch<A, T>>>,
}

/// Wraps an async `callback` with debounce semantics.
///
/// Every call returns a future resolving to the result of the invocation
/// that consumed it: the leading invocation for a leading-edge call, the
/// trailing invocation for calls coalesced into the burst. Calls that no
/// invocation consumes (cancelled, or dropped because `trailing` is off)
/// resolve to `None`.
///
/// # Examples
///
/// ```rust,ignore
/// use tempora::debounce::{debounce_async, DebounceOptions};
/// use std::time::Duration;
///
/// let search = debounce_async(
///     |query: String| async move { query.len() },
///     Duration::from_millis(200),
///     DebounceOptions::default(),
/// );
///
/// let first = search.call("ru".into());
/// let second = search.call("rust".into());
/// assert_eq!(first.await, Some(4));
/// assert_eq!(second.await, Some(4));
/// ```
pub fn debounce_async<A, T, F, Fut>(
    callback: F,
    wait: Duration,
    options: DebounceOptions,
) -> AsyncDebounced<A, T>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let edges = options.edges();
    AsyncDebounced {
        gate: Gate::new(
            fan_out(callback, options.timer.clone()),
            Batch::merge,
            wait,
            edges,
            Mode::Debounce,
            options.timer,
        ),
    }
}

impl<A, T> AsyncDebounced<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    /// Records a call and returns a future for its eventual result.
    ///
    /// The call is registered immediately; awaiting the future is optional.
    pub fn call(&self, args: A) -> impl Future<Output = Option<T>> + Send + use<A, T> {
        let (batch, receiver) = Batch::single(args);
        self.gate.call(batch);
        async move { receiver.await.ok() }
    }

    /// Drops the pending call; its waiters resolve to `None`.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    /// Starts the pending invocation immediately.
    ///
    /// Returns `true` if a call was pending.
    pub fn flush(&self) -> bool {
        self.gate.flush()
    }

    /// Returns `true` while a trailing call is waiting to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.gate.is_pending()
    }
}

impl<A, T> Clone for AsyncDebounced<A, T> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<A, T> fmt::Debug for AsyncDebounced<A, T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AsyncDebounced")
            .field("gate", &self.gate)
            .finish()
    }
}
