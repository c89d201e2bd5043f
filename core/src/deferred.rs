//! One-shot deferred values.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use crucible_types::Failure;

/// A value that becomes available later, settled at most once.
///
/// The settlement side is a [`Settler`], consumed by either
/// [`Settler::resolve`] or [`Settler::reject`]; a second settlement is
/// unrepresentable. Awaiting the deferred suspends the body until the
/// settlement event and resumes it with the value or the rejection reason at
/// that exact point.
///
/// Dropping the settler without settling leaves the deferred pending forever;
/// the completion gate's timeout is the only way out. That mirrors deferred
/// work that silently never completes, which is exactly the case the timeout
/// exists for.
#[derive(Debug)]
pub struct Deferred<T, E = Failure> {
    // None once the settler is known to be gone without having settled;
    // the receiver must not be polled again after that.
    rx: Option<oneshot::Receiver<Result<T, E>>>,
}

/// Settlement handle for a [`Deferred`]. Consumed on use.
#[derive(Debug)]
pub struct Settler<T, E = Failure> {
    tx: oneshot::Sender<Result<T, E>>,
}

/// Create an unsettled deferred value and its settler.
#[must_use]
pub fn deferred<T, E>() -> (Deferred<T, E>, Settler<T, E>) {
    let (tx, rx) = oneshot::channel();
    (Deferred { rx: Some(rx) }, Settler { tx })
}

impl<T, E> Settler<T, E> {
    /// Settle with a value. A no-op if the deferred side was dropped.
    pub fn resolve(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    /// Settle with a rejection reason. A no-op if the deferred side was dropped.
    pub fn reject(self, reason: E) {
        let _ = self.tx.send(Err(reason));
    }
}

impl<T, E> Deferred<T, E> {
    /// An already-resolved deferred.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        let (this, settler) = deferred();
        settler.resolve(value);
        this
    }

    /// An already-rejected deferred.
    #[must_use]
    pub fn rejected(reason: E) -> Self {
        let (this, settler) = deferred();
        settler.reject(reason);
        this
    }
}

impl<T, E> Deferred<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// A deferred that resolves with `value` after `delay`.
    ///
    /// Must be called within a tokio runtime; the settlement runs on a
    /// spawned task, so handlers attached to this deferred observe real
    /// suspension rather than an immediate value.
    #[must_use]
    pub fn resolve_after(delay: Duration, value: T) -> Self {
        let (this, settler) = deferred();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            settler.resolve(value);
        });
        this
    }

    /// A deferred that rejects with `reason` after `delay`.
    #[must_use]
    pub fn reject_after(delay: Duration, reason: E) -> Self {
        let (this, settler) = deferred();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            settler.reject(reason);
        });
        this
    }
}

impl<T, E> Future for Deferred<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Settler dropped without settling: stay pending. No waker will
            // ever fire again for this future; the gate's timeout bounds it.
            Poll::Ready(Err(_closed)) => {
                self.rx = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
