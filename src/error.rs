//! Error types shared by the control-flow utilities.
//!
//! - [`AbortError`]: a cooperative cancellation was observed
//! - [`TimeoutError`]: a deadline elapsed before the raced future settled
//! - [`TaskError`]: the terminal error of [`retry`](crate::retry) and
//!   [`map_concurrent`](crate::map), either an abort or the operation's own error
//!
//! Operation errors are never wrapped beyond [`TaskError::Failed`], so the
//! caller always gets back exactly the error its operation produced.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Message used when a signal is aborted without a reason.
pub const DEFAULT_ABORT_MESSAGE: &str = "This operation was aborted";

/// Message used when a timeout fires without a configured message.
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "Timeout";

// =============================================================================
// AbortError
// =============================================================================

/// Error representing an observed abort signal.
///
/// Carries the reason given to
/// [`AbortController::abort_with`](crate::signal::AbortController::abort_with),
/// if any.
///
/// # Examples
///
/// ```rust
/// use tempora::error::AbortError;
///
/// assert_eq!(AbortError::new().to_string(), "This operation was aborted");
/// assert_eq!(AbortError::with_reason("shutdown").to_string(), "shutdown");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct AbortError {
    reason: Option<String>,
}

impl AbortError {
    /// Creates a generic abort error with no reason.
    #[must_use]
    pub const fn new() -> Self {
        Self { reason: None }
    }

    /// Creates an abort error carrying `reason`.
    #[must_use]
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// Returns the reason, if one was given.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the reason, or the generic abort message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.reason.as_deref().unwrap_or(DEFAULT_ABORT_MESSAGE)
    }
}

impl fmt::Display for AbortError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.message())
    }
}

impl Default for AbortError {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TimeoutError
// =============================================================================

/// Error representing an elapsed deadline.
///
/// Distinct from any error the raced future itself produces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TimeoutError {
    /// The configured message (default `"Timeout"`).
    pub message: String,
    /// The deadline that was exceeded.
    pub duration: Duration,
}

impl TimeoutError {
    /// Creates a timeout error with the default message.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
            duration,
        }
    }

    /// Creates a timeout error with a custom message.
    #[must_use]
    pub fn with_message(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration,
        }
    }
}

// =============================================================================
// TaskError
// =============================================================================

/// Terminal error of an abortable operation.
///
/// `Failed` holds the operation's most recent error as-is: earlier errors
/// from exhausted retry attempts or sibling mapper failures are discarded,
/// never aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError<E> {
    /// The abort signal fired before the operation could finish.
    #[error(transparent)]
    Aborted(AbortError),

    /// The operation itself failed.
    #[error("{0}")]
    Failed(E),
}

impl<E> TaskError<E> {
    /// Returns `true` if this error came from an abort signal.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Returns the operation's error, or `None` for aborts.
    #[must_use]
    pub fn into_failed(self) -> Option<E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Aborted(_) => None,
        }
    }

    /// Returns the abort error, or `None` for operation failures.
    #[must_use]
    pub const fn as_aborted(&self) -> Option<&AbortError> {
        match self {
            Self::Aborted(error) => Some(error),
            Self::Failed(_) => None,
        }
    }

    /// Maps the operation error, leaving aborts untouched.
    pub fn map_failed<F, G>(self, function: G) -> TaskError<F>
    where
        G: FnOnce(E) -> F,
    {
        match self {
            Self::Aborted(error) => TaskError::Aborted(error),
            Self::Failed(error) => TaskError::Failed(function(error)),
        }
    }
}

impl<E> From<AbortError> for TaskError<E> {
    fn from(error: AbortError) -> Self {
        Self::Aborted(error)
    }
}
