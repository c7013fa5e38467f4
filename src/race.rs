//! First-to-settle combinator.
//!
//! [`race`] polls two futures and resolves with whichever finishes first.
//! The loser is dropped with the `Race` future, which cancels it. Side
//! effects the loser has already handed to another task (for example a
//! spawned job) cannot be undone this way; they are only ignored.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pub use futures::future::Either;
use pin_project_lite::pin_project;

pin_project! {
    /// Future returned by [`race`].
    #[must_use = "futures do nothing unless polled"]
    #[derive(Debug)]
    pub struct Race<A, B> {
        #[pin]
        first: A,
        #[pin]
        second: B,
    }
}

/// Races `first` against `second`.
///
/// When both are ready in the same poll, `first` wins.
///
/// # Examples
///
/// ```rust,ignore
/// use tempora::race::{race, Either};
/// use std::time::Duration;
///
/// let slow = async {
///     tokio::time::sleep(Duration::from_millis(100)).await;
///     "slow"
/// };
/// let fast = async { "fast" };
///
/// assert!(matches!(race(slow, fast).await, Either::Right("fast")));
/// ```
pub const fn race<A, B>(first: A, second: B) -> Race<A, B>
where
    A: Future,
    B: Future,
{
    Race { first, second }
}

impl<A, B> Future for Race<A, B>
where
    A: Future,
    B: Future,
{
    type Output = Either<A::Output, B::Output>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Poll::Ready(value) = this.first.poll(context) {
            return Poll::Ready(Either::Left(value));
        }
        if let Poll::Ready(value) = this.second.poll(context) {
            return Poll::Ready(Either::Right(value));
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn first_wins_when_both_ready() {
        let result = race(async { 1 }, async { "two" }).await;
        assert!(matches!(result, Either::Left(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn faster_future_wins() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            "slow"
        };
        let fast = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "fast"
        };

        let result = race(slow, fast).await;
        assert!(matches!(result, Either::Right("fast")));
    }

    #[tokio::test(start_paused = true)]
    async fn loser_is_dropped() {
        let (sender, receiver) = tokio::sync::oneshot::channel::<()>();
        let loser = async move {
            let _sender = sender;
            std::future::pending::<()>().await;
        };

        let result = race(async { 42 }, loser).await;
        assert!(matches!(result, Either::Left(42)));
        assert!(receiver.await.is_err());
    }
}
