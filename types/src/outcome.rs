//! Failure taxonomy and per-case outcome state machine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a test case failed.
///
/// Protocol violations are kept apart from assertion failures so tooling can
/// tell "test logic is wrong" from "test usage of the completion API is
/// wrong". Timeouts are not a failure kind; they are their own terminal
/// outcome ([`Outcome::TimedOut`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An expectation evaluated false.
    Assertion,
    /// Misuse of the completion API itself, e.g. a double completion signal.
    /// Always fatal, never recovered.
    ProtocolViolation,
    /// An uncaught failure raised by the body: a propagated error, a panic,
    /// or an unhandled rejection.
    Body,
}

impl FailureKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Assertion => "assertion failure",
            FailureKind::ProtocolViolation => "protocol violation",
            FailureKind::Body => "body failure",
        }
    }
}

/// Terminal failure reason for a test case.
///
/// Assertion failures carry the expected/actual renderings alongside the
/// message; other kinds carry only the message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Failure {
    #[must_use]
    pub fn assertion(
        message: impl Into<String>,
        expected: Option<String>,
        actual: Option<String>,
    ) -> Self {
        Self {
            kind: FailureKind::Assertion,
            message: message.into(),
            expected,
            actual,
        }
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ProtocolViolation,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    #[must_use]
    pub fn body(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Body,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }
}

// Rejection reasons in fixtures are often plain strings; let them propagate
// through `?` as body failures.
impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::body(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::body(message)
    }
}

/// Execution outcome of a single test case.
///
/// # State Machine
/// ```text
/// NotStarted -> Running -> { Pending(suspended) } -> { Passed | Failed | TimedOut }
/// ```
/// `Pending` may recur (one entry per suspension point), but a terminal state
/// is reached exactly once, by whichever completion path fires first. Once
/// `TimedOut`, later completion signals are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Body registered deferred work that has not settled yet.
    Pending,
    Passed,
    Failed(Failure),
    /// Neither the completion signal nor the awaited future settled within
    /// the allotted time.
    TimedOut { limit_ms: u64 },
}

impl Outcome {
    #[must_use]
    pub fn timed_out(limit: Duration) -> Self {
        Outcome::TimedOut {
            limit_ms: limit.as_millis() as u64,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Passed => "passed",
            Outcome::Failed(_) => "failed",
            Outcome::TimedOut { .. } => "timed out",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Failed(failure) => {
                write!(f, "failed ({}): {}", failure.kind.label(), failure.message)
            }
            Outcome::TimedOut { limit_ms } => {
                write!(f, "timed out waiting for completion ({limit_ms}ms)")
            }
            other => f.write_str(other.label()),
        }
    }
}
