//! Run report persistence.
//!
//! Uses a temp file + rename so a crashed run never leaves a truncated
//! report behind.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crucible_types::RunReport;

/// Write the run report as pretty-printed JSON, atomically.
pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(report).context("serializing run report")?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("creating report directory {}", parent.display()))?;

    // Temp file in the target directory so the rename stays on one filesystem.
    let mut tmp = NamedTempFile::new_in(parent).context("creating temporary report file")?;
    tmp.write_all(&json).context("writing run report")?;
    tmp.persist(path)
        .with_context(|| format!("persisting report to {}", path.display()))?;

    tracing::debug!(path = %path.display(), bytes = json.len(), "run report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crucible_types::{CaseReport, Outcome};

    fn sample_report() -> RunReport {
        RunReport {
            suite: "demo".to_string(),
            started_at: Utc::now(),
            duration_ms: 7,
            cases: vec![CaseReport {
                path: vec![],
                name: "two plus two is four".to_string(),
                outcome: Outcome::Passed,
                duration_ms: 1,
            }],
        }
    }

    #[test]
    fn report_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("reports").join("run.json");

        write_report(&sample_report(), &path).expect("write report");

        let raw = std::fs::read_to_string(&path).expect("read report");
        let parsed: RunReport = serde_json::from_str(&raw).expect("parse report");
        assert_eq!(parsed.suite, "demo");
        assert_eq!(parsed.cases.len(), 1);
        assert!(parsed.all_passed());
    }

    #[test]
    fn rewriting_replaces_the_previous_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.json");

        write_report(&sample_report(), &path).expect("first write");
        let mut second = sample_report();
        second.suite = "demo-2".to_string();
        write_report(&second, &path).expect("second write");

        let raw = std::fs::read_to_string(&path).expect("read report");
        let parsed: RunReport = serde_json::from_str(&raw).expect("parse report");
        assert_eq!(parsed.suite, "demo-2");
    }
}
