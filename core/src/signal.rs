//! Callback-style completion signaling.

use tokio::sync::mpsc;

use crucible_types::Failure;

/// One invocation of a [`Done`] handle.
#[derive(Debug)]
pub enum SignalEvent {
    /// Invoked with no error: the case passes.
    Pass,
    /// Invoked with an error: the case fails with that reason.
    Fail(Failure),
}

/// Completion handle handed to callback-style test bodies.
///
/// Cloneable so fixtures can move it into spawned work. Every invocation is
/// delivered to the gate: the first settles the case and any later one is a
/// protocol violation, independent of the arguments on either call. The gate
/// observes "all handles dropped" as channel closure.
#[derive(Debug, Clone)]
pub struct Done {
    tx: mpsc::UnboundedSender<SignalEvent>,
}

impl Done {
    /// Signal successful completion.
    pub fn pass(&self) {
        // Send failure means the gate already stopped listening (e.g. after
        // a timeout); late signals are ignored.
        if self.tx.send(SignalEvent::Pass).is_err() {
            tracing::debug!("completion signal arrived after the case settled");
        }
    }

    /// Signal completion with a failure reason.
    pub fn fail(&self, reason: impl Into<Failure>) {
        if self.tx.send(SignalEvent::Fail(reason.into())).is_err() {
            tracing::debug!("completion signal arrived after the case settled");
        }
    }

    /// Settle from an expectation result: `Ok` passes, `Err` carries the
    /// assertion failure. The callback-body equivalent of wrapping
    /// expectations in try/catch and handing the error to `done`.
    pub fn settle(&self, result: Result<(), Failure>) {
        match result {
            Ok(()) => self.pass(),
            Err(failure) => self.fail(failure),
        }
    }
}

/// Gate-side receiver for completion signals.
#[derive(Debug)]
pub struct SignalReceiver {
    rx: mpsc::UnboundedReceiver<SignalEvent>,
}

impl SignalReceiver {
    /// Next signal, or `None` once every [`Done`] handle is dropped.
    pub async fn next(&mut self) -> Option<SignalEvent> {
        self.rx.recv().await
    }

    /// First signal; pends forever if every handle is dropped unfired, so a
    /// caller-imposed deadline decides the outcome.
    pub async fn first(&mut self) -> SignalEvent {
        match self.rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

/// Create a completion signal pair.
#[must_use]
pub fn completion_signal() -> (Done, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Done { tx }, SignalReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn first_invocation_is_delivered() {
        let (done, mut rx) = completion_signal();
        done.pass();
        assert!(matches!(rx.next().await, Some(SignalEvent::Pass)));
    }

    #[tokio::test]
    async fn every_invocation_is_delivered_in_order() {
        let (done, mut rx) = completion_signal();
        done.pass();
        done.fail("called twice");
        drop(done);
        assert!(matches!(rx.next().await, Some(SignalEvent::Pass)));
        assert!(matches!(rx.next().await, Some(SignalEvent::Fail(_))));
        assert!(rx.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handles_leave_first_pending() {
        let (done, mut rx) = completion_signal();
        drop(done);
        let waited = tokio::time::timeout(Duration::from_millis(50), rx.first()).await;
        assert!(waited.is_err(), "first() must pend once all handles are gone");
    }

    #[tokio::test]
    async fn settle_maps_expectation_results() {
        let (done, mut rx) = completion_signal();
        done.settle(Ok(()));
        done.settle(Err(Failure::body("boom")));
        assert!(matches!(rx.next().await, Some(SignalEvent::Pass)));
        assert!(matches!(rx.next().await, Some(SignalEvent::Fail(f)) if f.message == "boom"));
    }
}
