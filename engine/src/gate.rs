//! Async test completion gate.
//!
//! Decides, for a single test case, the moment execution is considered
//! complete and whether it passed. Three completion paths exist, one per
//! body form; whichever fires first settles the case exactly once.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::time::Instant;

use crucible_core::{Done, SignalEvent, TestCx, completion_signal};
use crucible_types::{Failure, Outcome};

use crate::config::RunConfig;

/// How a test body produces its result.
pub enum TestBody {
    /// Returns synchronously: `Ok` passes, `Err` or a panic fails, and no
    /// async completion path is consulted afterward.
    Sync(Box<dyn FnOnce(TestCx) -> Result<(), Failure> + Send>),
    /// Receives a completion handle; the case stays pending until the handle
    /// fires or the timeout elapses.
    Callback(Box<dyn FnOnce(TestCx, Done) + Send>),
    /// Returns a future; settlement of that future settles the case.
    Future(Box<dyn FnOnce(TestCx) -> BoxFuture<'static, Result<(), Failure>> + Send>),
}

impl fmt::Debug for TestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TestBody::Sync(_) => "TestBody::Sync",
            TestBody::Callback(_) => "TestBody::Callback",
            TestBody::Future(_) => "TestBody::Future",
        })
    }
}

/// A single registered test case: a name and a body.
#[derive(Debug)]
pub struct TestCase {
    pub(crate) name: String,
    pub(crate) body: TestBody,
}

impl TestCase {
    #[must_use]
    pub fn sync(
        name: impl Into<String>,
        body: impl FnOnce(TestCx) -> Result<(), Failure> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: TestBody::Sync(Box::new(body)),
        }
    }

    #[must_use]
    pub fn callback(
        name: impl Into<String>,
        body: impl FnOnce(TestCx, Done) + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: TestBody::Callback(Box::new(body)),
        }
    }

    #[must_use]
    pub fn future<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(TestCx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: TestBody::Future(Box::new(move |cx| body(cx).boxed())),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Drive one case to its terminal outcome.
///
/// The assertion plan is consulted only after an otherwise-passing body: an
/// existing failure already explains the case, and a plan mismatch must not
/// mask it.
pub(crate) async fn run_case(case: TestCase, config: &RunConfig) -> Outcome {
    let cx = TestCx::new();
    let outcome = drive(case.body, &cx, config).await;
    match outcome {
        Outcome::Passed => match cx.log().check_plan() {
            Ok(()) => Outcome::Passed,
            Err(failure) => Outcome::Failed(failure),
        },
        other => other,
    }
}

async fn drive(body: TestBody, cx: &TestCx, config: &RunConfig) -> Outcome {
    match body {
        TestBody::Sync(body) => run_sync(body, cx),
        TestBody::Callback(body) => run_callback(body, cx, config).await,
        TestBody::Future(body) => run_future(body, cx, config).await,
    }
}

fn run_sync(body: Box<dyn FnOnce(TestCx) -> Result<(), Failure> + Send>, cx: &TestCx) -> Outcome {
    match std::panic::catch_unwind(AssertUnwindSafe(|| body(cx.clone()))) {
        Ok(Ok(())) => Outcome::Passed,
        Ok(Err(failure)) => Outcome::Failed(failure),
        Err(panic) => Outcome::Failed(Failure::body(panic_message(panic.as_ref()))),
    }
}

async fn run_callback(
    body: Box<dyn FnOnce(TestCx, Done) + Send>,
    cx: &TestCx,
    config: &RunConfig,
) -> Outcome {
    let (done, mut signals) = completion_signal();

    // The body registers its deferred work synchronously; a panic here fails
    // the case before any signal is consulted.
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| body(cx.clone(), done))) {
        return Outcome::Failed(Failure::body(panic_message(panic.as_ref())));
    }

    let deadline = Instant::now() + config.case_timeout;
    let Ok(first) = tokio::time::timeout_at(deadline, signals.first()).await else {
        // The receiver is dropped on return, so a signal arriving after the
        // timeout cannot resurrect the case.
        return Outcome::timed_out(config.case_timeout);
    };

    let outcome = match first {
        SignalEvent::Pass => Outcome::Passed,
        SignalEvent::Fail(failure) => Outcome::Failed(failure),
    };

    // A second signal is a protocol violation, independent of what either
    // invocation carried. Handles usually drop right after firing, which
    // closes the channel and makes this check immediate; a still-live handle
    // gets the grace window to show its second call.
    match tokio::time::timeout(config.signal_grace, signals.next()).await {
        Ok(Some(_)) => Outcome::Failed(Failure::protocol(
            "completion signal invoked more than once",
        )),
        _ => outcome,
    }
}

async fn run_future(
    body: Box<dyn FnOnce(TestCx) -> BoxFuture<'static, Result<(), Failure>> + Send>,
    cx: &TestCx,
    config: &RunConfig,
) -> Outcome {
    // The body can panic while constructing the future, before the first poll.
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| body(cx.clone()))) {
        Ok(future) => AssertUnwindSafe(future).catch_unwind(),
        Err(panic) => return Outcome::Failed(Failure::body(panic_message(panic.as_ref()))),
    };
    let deadline = Instant::now() + config.case_timeout;
    match tokio::time::timeout_at(deadline, future).await {
        Err(_elapsed) => Outcome::timed_out(config.case_timeout),
        Ok(Err(panic)) => Outcome::Failed(Failure::body(panic_message(panic.as_ref()))),
        Ok(Ok(Ok(()))) => Outcome::Passed,
        Ok(Ok(Err(failure))) => Outcome::Failed(failure),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "body panicked".to_string()
    }
}
