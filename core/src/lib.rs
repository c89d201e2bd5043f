//! Completion-gate primitives for Crucible.
//!
//! This crate holds the building blocks the engine's completion gate is
//! assembled from:
//!
//! - [`Deferred`]/[`Settler`] - a value that becomes available later, settled
//!   at most once (the type system forbids a second settlement).
//! - [`Done`]/[`SignalReceiver`] - callback-style completion signaling for
//!   bodies that finish via an explicit one-shot callback.
//! - [`TestCx`]/[`Expectation`] - expectation evaluation with assertion
//!   accounting, including the planned-count guard.
//! - [`MockFn`]/[`MockInstances`]/[`SubstitutionRegistry`] - recorded
//!   stand-ins and explicit dependency substitution.
//!
//! Nothing here owns a scheduler; driving bodies to completion is the
//! engine's job.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod deferred;
mod expect;
mod mock;
mod signal;

pub use deferred::{Deferred, Settler, deferred};
pub use expect::{AssertionLog, Expectation, TestCx};
pub use mock::{MockFn, MockInstances, SubstitutionRegistry};
pub use signal::{Done, SignalEvent, SignalReceiver, completion_signal};
