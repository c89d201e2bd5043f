//! Core domain types for Crucible.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the harness.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod outcome;
mod report;

pub use outcome::{Failure, FailureKind, Outcome};
pub use report::{CaseReport, RunReport};
