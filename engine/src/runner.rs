//! Suite execution: walks the scope tree and drives cases through the gate.

use std::panic::AssertUnwindSafe;

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::time::Instant;

use crucible_types::{CaseReport, Failure, Outcome, RunReport};

use crate::config::RunConfig;
use crate::gate::{self, TestCase};
use crate::suite::{Hook, Scope, ScopeItem, Suite};

/// Runs suites one case at a time, composing hook chains per the scope tree.
#[derive(Debug, Clone)]
pub struct SuiteRunner {
    config: RunConfig,
}

impl SuiteRunner {
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Run the suite on the current task.
    pub async fn run(&self, suite: Suite) -> RunReport {
        let started_at = Utc::now();
        let started = Instant::now();
        tracing::info!(
            suite = %suite.name,
            cases = suite.root.case_count(),
            "suite started"
        );

        let mut cases = Vec::new();
        self.run_scope(suite.root, Vec::new(), Vec::new(), Vec::new(), &mut cases)
            .await;

        let report = RunReport {
            suite: suite.name,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            cases,
        };
        tracing::info!(summary = %report.summary_line(), "suite finished");
        report
    }

    /// Run the suite to completion on a fresh current-thread runtime: one
    /// body at a time, cooperative suspension points only.
    pub fn run_blocking(&self, suite: Suite) -> anyhow::Result<RunReport> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(runtime.block_on(self.run(suite)))
    }

    fn run_scope<'a>(
        &'a self,
        scope: Scope,
        path: Vec<String>,
        inherited_before: Vec<Hook>,
        inherited_after: Vec<Hook>,
        reports: &'a mut Vec<CaseReport>,
    ) -> BoxFuture<'a, ()> {
        async move {
            let Scope {
                name,
                before_all,
                before_each,
                after_each,
                after_all,
                items,
            } = scope;
            let label = if name.is_empty() {
                "<root>"
            } else {
                name.as_str()
            };

            // Once-hooks: outer scopes reached theirs first by recursion order.
            for hook in &before_all {
                if let Err(failure) = run_hook(hook, &self.config).await {
                    tracing::warn!(
                        scope = %label,
                        error = %failure,
                        "before_all hook failed; failing every case in scope"
                    );
                    fail_items(items, &path, &failure, reports);
                    run_after_all(&after_all, label, &self.config).await;
                    return;
                }
            }

            // Entry order outer-before-inner, exit order inner-before-outer.
            let mut before_chain = inherited_before;
            before_chain.extend(before_each.iter().cloned());
            let mut after_chain = after_each.clone();
            after_chain.extend(inherited_after.iter().cloned());

            for item in items {
                match item {
                    ScopeItem::Case(case) => {
                        let report = self
                            .run_case_with_hooks(case, &path, &before_chain, &after_chain)
                            .await;
                        tracing::info!(
                            case = %report.full_name(),
                            outcome = %report.outcome,
                            "case finished"
                        );
                        reports.push(report);
                    }
                    ScopeItem::Child(child) => {
                        let mut child_path = path.clone();
                        child_path.push(child.name.clone());
                        self.run_scope(
                            child,
                            child_path,
                            before_chain.clone(),
                            after_chain.clone(),
                            reports,
                        )
                        .await;
                    }
                }
            }

            run_after_all(&after_all, label, &self.config).await;
        }
        .boxed()
    }

    async fn run_case_with_hooks(
        &self,
        case: TestCase,
        path: &[String],
        before: &[Hook],
        after: &[Hook],
    ) -> CaseReport {
        let name = case.name().to_string();
        let started = Instant::now();

        let mut pre_failure = None;
        for hook in before {
            if let Err(failure) = run_hook(hook, &self.config).await {
                tracing::warn!(case = %name, error = %failure, "before_each hook failed");
                pre_failure = Some(failure);
                break;
            }
        }

        // A failed before_each fails the case without running its body.
        let mut outcome = match pre_failure {
            Some(failure) => Outcome::Failed(failure),
            None => gate::run_case(case, &self.config).await,
        };

        // Teardown always runs; its failure overrides a pass but never an
        // existing failure.
        for hook in after {
            if let Err(failure) = run_hook(hook, &self.config).await {
                tracing::warn!(case = %name, error = %failure, "after_each hook failed");
                if outcome.is_passed() {
                    outcome = Outcome::Failed(failure);
                }
            }
        }

        CaseReport {
            path: path.to_vec(),
            name,
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

async fn run_after_all(hooks: &[Hook], label: &str, config: &RunConfig) {
    for hook in hooks {
        if let Err(failure) = run_hook(hook, config).await {
            tracing::error!(scope = %label, error = %failure, "after_all hook failed");
        }
    }
}

/// Hooks share the per-case deadline and panic isolation.
async fn run_hook(hook: &Hook, config: &RunConfig) -> Result<(), Failure> {
    let deadline = Instant::now() + config.case_timeout;
    let guarded = AssertUnwindSafe(async { (hook)().await }).catch_unwind();
    match tokio::time::timeout_at(deadline, guarded).await {
        Err(_elapsed) => Err(Failure::body(format!(
            "hook did not complete within {}ms",
            config.case_timeout.as_millis()
        ))),
        Ok(Err(panic)) => Err(Failure::body(gate::panic_message(panic.as_ref()))),
        Ok(Ok(result)) => result,
    }
}

/// Report every case under a failed before_all without running any body.
fn fail_items(
    items: Vec<ScopeItem>,
    path: &[String],
    failure: &Failure,
    reports: &mut Vec<CaseReport>,
) {
    for item in items {
        match item {
            ScopeItem::Case(case) => reports.push(CaseReport {
                path: path.to_vec(),
                name: case.name().to_string(),
                outcome: Outcome::Failed(failure.clone()),
                duration_ms: 0,
            }),
            ScopeItem::Child(child) => {
                let mut child_path = path.to_vec();
                child_path.push(child.name.clone());
                fail_items(child.items, &child_path, failure, reports);
            }
        }
    }
}
