//! Crucible CLI - runs the bundled demonstration suite.
//!
//! ```text
//! main() -> RunConfig::load() -> SuiteRunner::run() -> per-case lines + summary
//!                                       |
//!                                       v
//!                            optional JSON report on disk
//! ```
//!
//! Exit code is 0 when every case passed, 1 otherwise.

mod demo;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crucible_engine::{RunConfig, SuiteRunner, write_report};
use crucible_types::RunReport;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    // Results go to stdout; diagnostics stay on stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// `--report <path>` overrides the config file and environment.
fn report_path_from_args() -> Option<PathBuf> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--report" => return args.next().map(PathBuf::from),
            other if other.starts_with("--report=") => {
                return other.split_once('=').map(|(_, path)| PathBuf::from(path));
            }
            other => {
                tracing::warn!(argument = other, "ignoring unrecognized argument");
            }
        }
    }
    None
}

fn print_report(report: &RunReport) {
    for case in &report.cases {
        let verdict = if case.outcome.is_passed() {
            "PASS"
        } else {
            "FAIL"
        };
        println!("{verdict}  {} ({}ms)", case.full_name(), case.duration_ms);
        if let Some(failure) = case.outcome.failure() {
            println!("      {}: {failure}", failure.kind.label());
        }
    }
    println!("\n{}", report.summary_line());
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let mut config = RunConfig::load();
    if let Some(path) = report_path_from_args() {
        config.report_path = Some(path);
    }

    let runner = SuiteRunner::new(config.clone());
    let report = runner.run(demo::suite()).await;
    print_report(&report);

    if let Some(path) = &config.report_path {
        write_report(&report, path)?;
        println!("report written to {}", path.display());
    }

    if report.all_passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
