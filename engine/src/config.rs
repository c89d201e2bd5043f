//! Runner configuration.
//!
//! Load order: built-in defaults, then an optional `crucible.toml`, then
//! environment overrides (`CRUCIBLE_TIMEOUT_MS`, `CRUCIBLE_SIGNAL_GRACE_MS`,
//! `CRUCIBLE_REPORT`). Unparsable values are ignored with a warning rather
//! than aborting the run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Default per-case completion deadline.
pub const DEFAULT_CASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default window after the first completion signal in which a duplicate
/// signal is reported as a protocol violation.
pub const DEFAULT_SIGNAL_GRACE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Per-case completion deadline; hooks share it.
    pub case_timeout: Duration,
    /// Duplicate-signal detection window.
    pub signal_grace: Duration,
    /// Where to persist the JSON run report, if anywhere.
    pub report_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            case_timeout: DEFAULT_CASE_TIMEOUT,
            signal_grace: DEFAULT_SIGNAL_GRACE,
            report_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    runner: Option<RunnerSection>,
}

#[derive(Debug, Default, Deserialize)]
struct RunnerSection {
    timeout_ms: Option<u64>,
    signal_grace_ms: Option<u64>,
    report_path: Option<PathBuf>,
}

impl RunConfig {
    /// Load from `crucible.toml` in the working directory, if present.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from(Path::new("crucible.toml"))
    }

    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::default();
        // A missing config file is the common case, not an error.
        if let Ok(raw) = std::fs::read_to_string(path) {
            match toml::from_str::<ConfigFile>(&raw) {
                Ok(file) => config.apply_file(file),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "ignoring unparsable config file"
                    );
                }
            }
        }
        config.apply_env();
        config
    }

    fn apply_file(&mut self, file: ConfigFile) {
        let Some(runner) = file.runner else {
            return;
        };
        if let Some(ms) = runner.timeout_ms {
            self.case_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = runner.signal_grace_ms {
            self.signal_grace = Duration::from_millis(ms);
        }
        if runner.report_path.is_some() {
            self.report_path = runner.report_path;
        }
    }

    fn apply_env(&mut self) {
        if let Some(timeout) = env_duration_ms("CRUCIBLE_TIMEOUT_MS") {
            self.case_timeout = timeout;
        }
        if let Some(grace) = env_duration_ms("CRUCIBLE_SIGNAL_GRACE_MS") {
            self.signal_grace = grace;
        }
        if let Ok(path) = std::env::var("CRUCIBLE_REPORT")
            && !path.trim().is_empty()
        {
            self.report_path = Some(PathBuf::from(path));
        }
    }
}

fn env_duration_ms(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            tracing::warn!(key, value = %raw, error = %err, "ignoring unparsable duration override");
            None
        }
    }
}
