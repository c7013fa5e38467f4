//! Cooperative cancellation.
//!
//! An [`AbortController`] owns the right to abort; the [`AbortSignal`]s it
//! hands out can only observe. Utilities check the signal before starting
//! new work (a retry attempt, the next mapped item) and while waiting on a
//! backoff. Work that is already running is never preempted.
//!
//! # Examples
//!
//! ```rust
//! use tempora::signal::AbortController;
//!
//! let controller = AbortController::new();
//! let signal = controller.signal();
//! assert!(!signal.is_aborted());
//!
//! controller.abort_with("shutting down");
//! assert!(signal.is_aborted());
//! assert_eq!(signal.reason().unwrap().to_string(), "shutting down");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::AbortError;

/// Reason recorded by [`AbortSignal::timeout`].
pub const SIGNAL_TIMEOUT_REASON: &str = "signal timed out";

struct SignalState {
    token: CancellationToken,
    reason: Mutex<Option<AbortError>>,
}

impl SignalState {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Mutex::new(None),
        }
    }

    fn abort(&self, error: AbortError) {
        {
            let mut reason = self.reason.lock();
            if reason.is_some() {
                return;
            }
            *reason = Some(error);
        }
        self.token.cancel();
    }
}

impl Drop for SignalState {
    /// Releases a pending [`AbortSignal::timeout`] task once no handle remains.
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// =============================================================================
// AbortController
// =============================================================================

/// The owning side of an abort signal.
#[derive(Clone)]
pub struct AbortController {
    state: Arc<SignalState>,
}

impl AbortController {
    /// Creates a controller whose signal is not yet aborted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    /// Returns a signal observing this controller.
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            state: self.state.clone(),
        }
    }

    /// Aborts without a reason.
    ///
    /// Observers see the generic abort error. Has no effect if already aborted.
    pub fn abort(&self) {
        self.state.abort(AbortError::new());
    }

    /// Aborts with `reason`.
    ///
    /// The first abort wins; later reasons are ignored.
    pub fn abort_with(&self, reason: impl Into<String>) {
        self.state.abort(AbortError::with_reason(reason));
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortController {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AbortController")
            .field("aborted", &self.state.token.is_cancelled())
            .finish()
    }
}

// =============================================================================
// AbortSignal
// =============================================================================

/// A read-only view of an [`AbortController`].
///
/// Cloning is cheap; all clones observe the same abort.
#[derive(Clone)]
pub struct AbortSignal {
    state: Arc<SignalState>,
}

impl AbortSignal {
    /// Returns a signal that never aborts.
    #[must_use]
    pub fn never() -> Self {
        AbortController::new().signal()
    }

    /// Returns a signal that aborts itself after `duration`.
    ///
    /// The reason is [`SIGNAL_TIMEOUT_REASON`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        let signal = Self {
            state: Arc::new(SignalState::new()),
        };
        let state = Arc::downgrade(&signal.state);
        let token = signal.state.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(duration) => {
                    if let Some(state) = state.upgrade() {
                        state.abort(AbortError::with_reason(SIGNAL_TIMEOUT_REASON));
                    }
                }
                () = token.cancelled() => {}
            }
        });
        signal
    }

    /// Returns `true` once the controller has aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.token.is_cancelled()
    }

    /// Returns the abort error, or `None` while not aborted.
    #[must_use]
    pub fn reason(&self) -> Option<AbortError> {
        self.state.reason.lock().clone()
    }

    /// Returns `Err` with the abort error once aborted.
    ///
    /// # Errors
    ///
    /// Returns the [`AbortError`] recorded by the controller.
    pub fn check(&self) -> Result<(), AbortError> {
        self.reason().map_or(Ok(()), Err)
    }

    /// Waits until the controller aborts, returning the abort error.
    pub async fn aborted(&self) -> AbortError {
        self.state.token.cancelled().await;
        self.reason().unwrap_or_default()
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
