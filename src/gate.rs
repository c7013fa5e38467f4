//! Edge-triggered call gate shared by debounce and throttle.
//!
//! A gate coalesces payloads into windows. A call on an idle gate opens a
//! window of `wait`; the payload either fires immediately (leading edge) or
//! becomes pending. Calls inside an open window merge into the pending
//! payload. When the window closes the pending payload fires (trailing edge).
//!
//! The two modes differ only in how a window moves:
//!
//! - [`Mode::Debounce`]: every call pushes the deadline to `now + wait`, and
//!   the gate goes idle after the trailing edge.
//! - [`Mode::Throttle`]: the deadline is fixed when the window opens; a
//!   trailing fire immediately opens the next window, so at most one payload
//!   fires per `wait`.
//!
//! A window covers its deadline instant: a call landing exactly on the
//! deadline still merges into the closing window, which fires on the first
//! timer tick after the deadline.
//!
//! One background task per open window sleeps until the deadline. The state
//! lock is never held while spawning, sleeping or invoking the callback.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::trace;

use crate::timer::{Timer, TimerHandle};

/// Resolution of the tokio timer wheel.
const TICK: Duration = Duration::from_millis(1);

/// Consumes a payload that reached an edge.
pub(crate) type Invoke<P> = Arc<dyn Fn(P) + Send + Sync>;

/// Combines the pending payload with a newer one (`old`, `new`).
pub(crate) type Merge<P> = fn(P, P) -> P;

/// Keeps only the newest payload.
pub(crate) fn keep_latest<P>(_old: P, new: P) -> P {
    new
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Debounce,
    Throttle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edges {
    pub(crate) leading: bool,
    pub(crate) trailing: bool,
}

struct GateState<P> {
    pending: Option<P>,
    /// `Some` while a window is open.
    deadline: Option<Instant>,
    timer: Option<TimerHandle>,
    last_fired: Option<Instant>,
    /// Incremented every time an idle gate opens a window.
    window: u64,
}

impl<P> GateState<P> {
    /// Returns the deadline if window `id` is still the open one.
    fn deadline_of(&self, id: u64) -> Option<Instant> {
        self.deadline.filter(|_| self.window == id)
    }

    fn close(&mut self) {
        self.deadline = None;
        if let Some(handle) = self.timer.take() {
            handle.cancel();
        }
    }
}

pub(crate) struct Gate<P> {
    state: Mutex<GateState<P>>,
    wait: Duration,
    edges: Edges,
    mode: Mode,
    timer: Arc<dyn Timer>,
    invoke: Invoke<P>,
    merge: Merge<P>,
}

impl<P: Send + 'static> Gate<P> {
    pub(crate) fn new(
        invoke: Invoke<P>,
        merge: Merge<P>,
        wait: Duration,
        edges: Edges,
        mode: Mode,
        timer: Arc<dyn Timer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GateState {
                pending: None,
                deadline: None,
                timer: None,
                last_fired: None,
                window: 0,
            }),
            wait,
            edges,
            mode,
            timer,
            invoke,
            merge,
        })
    }

    pub(crate) fn call(self: &Arc<Self>, payload: P) {
        let now = self.timer.now();
        let (opened, leading) = {
            let mut state = self.state.lock();
            if state.deadline.is_none() {
                state.deadline = Some(now + self.wait);
                state.window = state.window.wrapping_add(1);
                let leading = if self.edges.leading {
                    state.last_fired = Some(now);
                    Some(payload)
                } else {
                    state.pending = Some(payload);
                    None
                };
                (Some(state.window), leading)
            } else {
                if self.mode == Mode::Debounce {
                    state.deadline = Some(now + self.wait);
                }
                state.pending = Some(match state.pending.take() {
                    Some(old) => (self.merge)(old, payload),
                    None => payload,
                });
                (None, None)
            }
        };

        if let Some(id) = opened {
            self.open_window(id);
        }
        if let Some(payload) = leading {
            trace!(mode = ?self.mode, "leading edge");
            (self.invoke)(payload);
        }
    }

    /// Drops the pending payload and closes the window.
    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock();
        state.pending = None;
        state.close();
    }

    /// Fires the pending payload now.
    ///
    /// A debounce window closes. A throttle window restarts from this
    /// invocation, so the next payload still waits a full `wait`.
    ///
    /// Returns `true` if a payload fired.
    pub(crate) fn flush(&self) -> bool {
        let pending = {
            let mut state = self.state.lock();
            let pending = state.pending.take();
            match self.mode {
                Mode::Debounce => state.close(),
                Mode::Throttle => {
                    if pending.is_some() && state.deadline.is_some() {
                        state.deadline = Some(self.timer.now() + self.wait);
                    }
                }
            }
            if pending.is_some() {
                state.last_fired = Some(self.timer.now());
            }
            pending
        };

        let Some(payload) = pending else {
            return false;
        };
        trace!(mode = ?self.mode, "flushed");
        (self.invoke)(payload);
        true
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub(crate) fn last_fired(&self) -> Option<Instant> {
        self.state.lock().last_fired
    }

    /// Spawns the task for window `id` and records its handle.
    ///
    /// The task may already have run by the time `spawn` returns, so the
    /// handle is kept only while window `id` is still open.
    fn open_window(self: &Arc<Self>, id: u64) {
        let gate = Arc::clone(self);
        let handle = self.timer.spawn(async move { gate.run_window(id).await }.boxed());

        let mut state = self.state.lock();
        if state.deadline_of(id).is_some() {
            state.timer = Some(handle);
        } else {
            handle.cancel();
        }
    }

    async fn run_window(self: Arc<Self>, id: u64) {
        loop {
            let Some(deadline) = self.state.lock().deadline_of(id) else {
                return;
            };
            let now = self.timer.now();
            if deadline >= now {
                self.timer.sleep(deadline - now + TICK).await;
                continue;
            }

            let (trailing, keep_open) = {
                let mut state = self.state.lock();
                match state.deadline_of(id) {
                    None => return,
                    Some(current) if current >= now => continue,
                    Some(_) => {}
                }

                match state.pending.take().filter(|_| self.edges.trailing) {
                    Some(payload) => {
                        state.last_fired = Some(now);
                        if self.mode == Mode::Throttle {
                            state.deadline = Some(now + self.wait);
                            (Some(payload), true)
                        } else {
                            state.deadline = None;
                            state.timer = None;
                            (Some(payload), false)
                        }
                    }
                    None => {
                        state.deadline = None;
                        state.timer = None;
                        (None, false)
                    }
                }
            };

            if let Some(payload) = trailing {
                trace!(mode = ?self.mode, "trailing edge");
                (self.invoke)(payload);
            }
            if !keep_open {
                return;
            }
        }
    }
}

// =============================================================================
// Async payloads
// =============================================================================

/// Arguments of a coalesced call plus everyone waiting for its result.
pub(crate) struct Batch<A, T> {
    args: A,
    waiters: Vec<oneshot::Sender<T>>,
}

impl<A, T> Batch<A, T> {
    pub(crate) fn single(args: A) -> (Self, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                args,
                waiters: vec![sender],
            },
            receiver,
        )
    }

    /// Keeps the newest arguments and every waiter.
    pub(crate) fn merge(mut old: Self, new: Self) -> Self {
        old.waiters.extend(new.waiters);
        Self {
            args: new.args,
            waiters: old.waiters,
        }
    }
}

/// Builds the edge handler for async callbacks.
///
/// Each invocation runs on a spawned task and fans its result out to every
/// waiter in the batch.
pub(crate) fn fan_out<A, T, F, Fut>(
    callback: F,
    timer: Arc<dyn Timer>,
) -> Arc<dyn Fn(Batch<A, T>) + Send + Sync>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    Arc::new(move |batch: Batch<A, T>| {
        let invocation = callback(batch.args);
        let waiters = batch.waiters;
        let _detached = timer.spawn(
            async move {
                let value = invocation.await;
                for waiter in waiters {
                    let _ = waiter.send(value.clone());
                }
            }
            .boxed(),
        );
    })
}

impl<P> fmt::Debug for Gate<P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        formatter
            .debug_struct("Gate")
            .field("mode", &self.mode)
            .field("wait", &self.wait)
            .field("leading", &self.edges.leading)
            .field("trailing", &self.edges.trailing)
            .field("pending", &state.pending.is_some())
            .field("open", &state.deadline.is_some())
            .finish_non_exhaustive()
    }
}
