//! # tempora
//!
//! Timing and concurrency combinators for async Rust on tokio.
//!
//! ## Overview
//!
//! Small, independent building blocks for controlling *when* and *how
//! often* async work runs:
//!
//! - **Retry**: exponential backoff with an attempt budget and abort signal
//! - **Timeout**: deadlines armed at call time, with custom messages
//! - **Debounce / Throttle**: edge-triggered call coalescing, sync and async
//! - **Concurrent map**: order-preserving mapping with a concurrency limit
//! - **Delay / Race / Abort signals**: the primitives the rest is built on
//!
//! Every instance returned by a factory (`debounce`, `throttle`, ...) owns
//! its own state. Nothing is shared between instances.
//!
//! ## Feature Flags
//!
//! - `retry`: [`retry`](crate::retry) module
//! - `timeout`: [`timeout`](crate::timeout) module
//! - `debounce`: [`debounce`](crate::debounce) and [`throttle`](crate::throttle)
//! - `map`: [`map`](crate::map) module
//! - `serde`: `Serialize`/`Deserialize` for the option structs
//! - `full`: Enable all features
//!
//! ## Example
//!
//! ```rust,ignore
//! use tempora::prelude::*;
//! use std::time::Duration;
//!
//! let body = retry(
//!     |_| async { fetch().timeout(Duration::from_secs(5)).await },
//!     RetryOptions::default(),
//! )
//! .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust,ignore
/// use tempora::prelude::*;
/// ```
pub mod prelude {
    pub use crate::delay::{defer, delay, sleep, sleep_with_signal};
    pub use crate::error::{AbortError, TaskError, TimeoutError};
    pub use crate::race::{Either, race};
    pub use crate::signal::{AbortController, AbortSignal};
    pub use crate::timer::{Timer, TimerHandle, TokioTimer};

    #[cfg(feature = "retry")]
    pub use crate::retry::{RetryContext, RetryOptions, retry, retry_if};

    #[cfg(feature = "timeout")]
    pub use crate::timeout::{TimeoutExt, TimeoutOptions, timeout, timeout_or_else, timeout_with};

    #[cfg(feature = "debounce")]
    pub use crate::debounce::{AsyncDebounced, DebounceOptions, Debounced, debounce, debounce_async};

    #[cfg(feature = "debounce")]
    pub use crate::throttle::{AsyncThrottled, ThrottleOptions, Throttled, throttle, throttle_async};

    #[cfg(feature = "map")]
    pub use crate::map::{MapOptions, for_each_concurrent, map_concurrent, map_concurrent_stream};
}

pub mod delay;
pub mod error;
pub mod race;
pub mod signal;
pub mod timer;

#[cfg(feature = "retry")]
pub mod retry;

#[cfg(feature = "timeout")]
pub mod timeout;

#[cfg(feature = "debounce")]
mod gate;

#[cfg(feature = "debounce")]
pub mod debounce;

#[cfg(feature = "debounce")]
pub mod throttle;

#[cfg(feature = "map")]
pub mod map;
