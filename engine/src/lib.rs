//! Crucible engine: the async test completion gate and suite orchestration.
//!
//! # Architecture
//!
//! ```text
//! Suite (scope tree) --> SuiteRunner --> completion gate --> RunReport
//!   describe/test           |               run_case            |
//!   hooks per scope         |            (gate.rs, one          v
//!                           |             case at a time)   persistence
//!                           v
//!              before/after chains composed
//!              outer->inner on entry, inner->outer on exit
//! ```
//!
//! The gate decides, for a single case, the moment execution is complete and
//! whether it passed:
//!
//! ```text
//! NotStarted -> Running -> { Pending(suspended) } -> { Passed | Failed | TimedOut }
//! ```
//!
//! One body executes at a time on a current-thread runtime; suspension points
//! (awaiting a deferred value, waiting for a completion signal) yield control
//! until the awaited condition is satisfied. The only cancellation trigger is
//! the completion timeout, and a case that timed out stays timed out.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod config;
mod gate;
mod persistence;
mod runner;
mod suite;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_CASE_TIMEOUT, DEFAULT_SIGNAL_GRACE, RunConfig};
pub use gate::{TestBody, TestCase};
pub use persistence::write_report;
pub use runner::SuiteRunner;
pub use suite::{Scope, Suite};
