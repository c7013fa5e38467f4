//! Order-preserving concurrent map.
//!
//! [`map_concurrent`] runs an async mapper over every item with at most
//! `concurrency` mapper futures in flight. Results come back in input order
//! no matter which future finishes first.
//!
//! The first mapper error ends the whole operation. Mapper futures still in
//! flight at that point are dropped, which cancels them at their next
//! suspension point; their results are never observed.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tempora::map::{map_concurrent, MapOptions};
//!
//! let sizes = map_concurrent(
//!     urls,
//!     |url, _index| async move { fetch_len(&url).await },
//!     MapOptions::default().with_concurrency(4),
//! )
//! .await?;
//! ```

use std::fmt;
use std::future::{self, Future};
use std::pin::pin;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, trace};

use crate::error::TaskError;
use crate::race::{Either, race};
use crate::signal::AbortSignal;

// =============================================================================
// Options
// =============================================================================

/// Configuration for [`map_concurrent`].
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MapOptions {
    /// Maximum number of mapper futures in flight. `0` means unbounded.
    pub concurrency: usize,
    /// Stops pulling new items once aborted.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub signal: Option<AbortSignal>,
}

impl MapOptions {
    /// Sets the concurrency limit. `0` means unbounded.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Attaches an abort signal.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Returns the effective limit, mapping `0` to unbounded.
    #[must_use]
    pub const fn limit(&self) -> usize {
        if self.concurrency == 0 {
            usize::MAX
        } else {
            self.concurrency
        }
    }

    const fn is_unbounded(&self) -> bool {
        self.concurrency == 0 || self.concurrency == usize::MAX
    }
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            concurrency: usize::MAX,
            signal: None,
        }
    }
}

impl fmt::Debug for MapOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = formatter.debug_struct("MapOptions");
        if self.is_unbounded() {
            debug.field("concurrency", &"unbounded");
        } else {
            debug.field("concurrency", &self.concurrency);
        }
        debug.field("signal", &self.signal).finish()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Maps every item of `items` through `mapper`, preserving input order.
///
/// `mapper` receives each item together with its index. Output slot `i`
/// always holds the result for input `i`.
///
/// # Errors
///
/// - [`TaskError::Failed`] with the first mapper error observed
/// - [`TaskError::Aborted`] once the signal fires; no further items are
///   pulled
pub async fn map_concurrent<I, T, E, F, Fut>(
    items: I,
    mapper: F,
    options: MapOptions,
) -> Result<Vec<T>, TaskError<E>>
where
    I: IntoIterator,
    F: FnMut(I::Item, usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    map_concurrent_stream(stream::iter(items), mapper, options).await
}

/// Like [`map_concurrent`], but pulls items from an async source.
///
/// Indices follow the order in which the source yields items.
///
/// # Errors
///
/// See [`map_concurrent`].
pub async fn map_concurrent_stream<S, T, E, F, Fut>(
    items: S,
    mut mapper: F,
    options: MapOptions,
) -> Result<Vec<T>, TaskError<E>>
where
    S: Stream,
    F: FnMut(S::Item, usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let limit = options.limit();
    let (lower, _) = items.size_hint();
    let mut slots: Vec<Option<T>> = Vec::with_capacity(lower);

    let gate = options.signal.clone();
    let open = move |_: &S::Item| {
        future::ready(gate.as_ref().is_none_or(|signal| !signal.is_aborted()))
    };
    let mut running = pin!(
        items
            .take_while(open)
            .enumerate()
            .map(|(index, item)| {
                trace!(index, "mapper started");
                let pending = mapper(item, index);
                async move { (index, pending.await) }
            })
            .buffer_unordered(limit)
    );

    loop {
        let next = match &options.signal {
            Some(signal) => match race(running.next(), signal.aborted()).await {
                Either::Left(next) => next,
                Either::Right(reason) => {
                    debug!(completed = slots.len(), reason = reason.message(), "map aborted");
                    return Err(TaskError::Aborted(reason));
                }
            },
            None => running.next().await,
        };

        let Some((index, result)) = next else {
            break;
        };
        match result {
            Ok(value) => {
                if slots.len() <= index {
                    slots.resize_with(index + 1, || None);
                }
                slots[index] = Some(value);
            }
            Err(error) => {
                debug!(index, "mapper failed, dropping in-flight items");
                return Err(TaskError::Failed(error));
            }
        }
    }

    if let Some(signal) = &options.signal {
        signal.check()?;
    }

    let total = slots.len();
    let values: Vec<T> = slots.into_iter().flatten().collect();
    debug_assert_eq!(values.len(), total, "every slot is written exactly once");
    Ok(values)
}

/// Runs `action` over every item for its side effects.
///
/// # Errors
///
/// See [`map_concurrent`].
pub async fn for_each_concurrent<I, E, F, Fut>(
    items: I,
    action: F,
    options: MapOptions,
) -> Result<(), TaskError<E>>
where
    I: IntoIterator,
    F: FnMut(I::Item, usize) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    map_concurrent(items, action, options).await.map(|_| ())
}
