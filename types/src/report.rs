//! Run reports: what a suite run produced, in serializable form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;

/// Result of one executed test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    /// Enclosing scope names, outermost first. Empty for root-level cases.
    pub path: Vec<String>,
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
}

impl CaseReport {
    /// Scope path and case name joined for display.
    #[must_use]
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = self.path.iter().map(String::as_str).collect();
        parts.push(&self.name);
        parts.join(" > ")
    }
}

/// Result of a whole suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    #[must_use]
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_passed()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} passed, {} failed, {} total ({}ms)",
            self.suite,
            self.passed(),
            self.failed(),
            self.cases.len(),
            self.duration_ms
        )
    }
}
