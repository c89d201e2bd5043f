//! Expectation evaluation and assertion accounting.
//!
//! Every matcher records exactly one evaluation in the shared
//! [`AssertionLog`] and returns `Result<(), Failure>` so bodies propagate
//! failures with `?`. Callback bodies hand the `Result` to
//! [`Done::settle`](crate::Done::settle) instead.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;

use crucible_types::Failure;

use crate::deferred::Deferred;

/// Shared assertion ledger for one test case.
///
/// Counts every expectation evaluated during the body, including those inside
/// callbacks and rejection handlers, and optionally carries a planned count.
/// If a plan of N is declared, the case fails unless exactly N evaluations
/// occurred - the only signal that an expected failure branch never ran.
#[derive(Debug, Default)]
pub struct AssertionLog {
    executed: AtomicUsize,
    planned: Mutex<Option<usize>>,
}

impl AssertionLog {
    pub fn record(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn plan(&self, count: usize) {
        *self
            .planned
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(count);
    }

    #[must_use]
    pub fn planned(&self) -> Option<usize> {
        *self.planned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compare executed evaluations against the plan, if one was declared.
    pub fn check_plan(&self) -> Result<(), Failure> {
        let executed = self.executed();
        match self.planned() {
            Some(planned) if planned != executed => Err(Failure::assertion(
                format!("expected {planned} assertion(s) to be evaluated, but {executed} were"),
                Some(planned.to_string()),
                Some(executed.to_string()),
            )),
            _ => Ok(()),
        }
    }
}

/// Per-case context handed to every body. Cheap to clone into callbacks; all
/// clones share one [`AssertionLog`].
#[derive(Debug, Clone, Default)]
pub struct TestCx {
    log: Arc<AssertionLog>,
}

impl TestCx {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the exact number of expectations this case must evaluate.
    pub fn plan_assertions(&self, count: usize) {
        self.log.plan(count);
    }

    /// Begin an expectation over `actual`.
    pub fn expect<T>(&self, actual: T) -> Expectation<T> {
        Expectation {
            actual,
            log: Arc::clone(&self.log),
            negated: false,
        }
    }

    #[must_use]
    pub fn log(&self) -> &Arc<AssertionLog> {
        &self.log
    }

    /// Await a deferred value, expecting it to resolve; yields an expectation
    /// over the resolved value. A rejection counts as one failed evaluation.
    pub async fn expect_resolves<T, E>(
        &self,
        value: Deferred<T, E>,
    ) -> Result<Expectation<T>, Failure>
    where
        E: Debug,
    {
        match value.await {
            Ok(resolved) => Ok(self.expect(resolved)),
            Err(reason) => {
                self.log.record();
                Err(Failure::assertion(
                    format!("expected deferred to resolve, but it rejected with {reason:?}"),
                    Some("resolved".to_string()),
                    Some(format!("rejected with {reason:?}")),
                ))
            }
        }
    }

    /// Await a deferred value, expecting it to reject; yields an expectation
    /// over the rejection reason. A resolution counts as one failed evaluation.
    pub async fn expect_rejects<T, E>(
        &self,
        value: Deferred<T, E>,
    ) -> Result<Expectation<E>, Failure>
    where
        T: Debug,
    {
        match value.await {
            Err(reason) => Ok(self.expect(reason)),
            Ok(resolved) => {
                self.log.record();
                Err(Failure::assertion(
                    format!("expected deferred to reject, but it resolved with {resolved:?}"),
                    Some("rejected".to_string()),
                    Some(format!("resolved with {resolved:?}")),
                ))
            }
        }
    }
}

/// A single expectation, consumed by one matcher call.
#[derive(Debug)]
pub struct Expectation<T> {
    actual: T,
    log: Arc<AssertionLog>,
    negated: bool,
}

fn finish(
    log: &AssertionLog,
    negated: bool,
    holds: bool,
    actual_repr: String,
    relation: &str,
    expected_repr: &str,
) -> Result<(), Failure> {
    log.record();
    if holds != negated {
        Ok(())
    } else {
        let negation = if negated { " not" } else { "" };
        Err(Failure::assertion(
            format!("expected {actual_repr}{negation} to {relation} {expected_repr}"),
            Some(expected_repr.to_string()),
            Some(actual_repr),
        ))
    }
}

impl<T> Expectation<T> {
    /// Invert the expectation: the matcher must not hold.
    #[must_use]
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

impl<T: Debug> Expectation<T> {
    fn verdict(self, holds: bool, relation: &str, expected_repr: &str) -> Result<(), Failure> {
        let actual_repr = format!("{:?}", self.actual);
        finish(
            &self.log,
            self.negated,
            holds,
            actual_repr,
            relation,
            expected_repr,
        )
    }
}

impl<T: Debug + PartialEq> Expectation<T> {
    /// Strict equality.
    pub fn to_be(self, expected: T) -> Result<(), Failure> {
        let holds = self.actual == expected;
        self.verdict(holds, "be", &format!("{expected:?}"))
    }

    /// Alias of [`Expectation::to_be`]; value types compare structurally.
    pub fn to_equal(self, expected: T) -> Result<(), Failure> {
        self.to_be(expected)
    }
}

impl<T: Debug + PartialOrd> Expectation<T> {
    pub fn to_be_greater_than(self, expected: T) -> Result<(), Failure> {
        let holds = self.actual > expected;
        self.verdict(holds, "be greater than", &format!("{expected:?}"))
    }

    pub fn to_be_greater_or_equal(self, expected: T) -> Result<(), Failure> {
        let holds = self.actual >= expected;
        self.verdict(holds, "be greater than or equal to", &format!("{expected:?}"))
    }

    pub fn to_be_less_than(self, expected: T) -> Result<(), Failure> {
        let holds = self.actual < expected;
        self.verdict(holds, "be less than", &format!("{expected:?}"))
    }

    pub fn to_be_less_or_equal(self, expected: T) -> Result<(), Failure> {
        let holds = self.actual <= expected;
        self.verdict(holds, "be less than or equal to", &format!("{expected:?}"))
    }
}

impl Expectation<f64> {
    /// Equality up to rounding error: `precision` decimal digits.
    pub fn to_be_close_to(self, expected: f64, precision: i32) -> Result<(), Failure> {
        let tolerance = 10f64.powi(-precision) / 2.0;
        let holds = (self.actual - expected).abs() < tolerance;
        self.verdict(
            holds,
            "be close to",
            &format!("{expected:?} (precision {precision})"),
        )
    }
}

impl<T: AsRef<str> + Debug> Expectation<T> {
    /// The actual string matches `pattern` (a regular expression; a plain
    /// substring is a valid pattern).
    pub fn to_match(self, pattern: &str) -> Result<(), Failure> {
        match Regex::new(pattern) {
            Ok(re) => {
                let holds = re.is_match(self.actual.as_ref());
                self.verdict(holds, "match", &format!("{pattern:?}"))
            }
            Err(err) => {
                self.log.record();
                Err(Failure::body(format!(
                    "invalid match pattern {pattern:?}: {err}"
                )))
            }
        }
    }
}

impl<T, U> Expectation<T>
where
    T: IntoIterator<Item = U> + Debug,
    U: PartialEq + Debug,
{
    /// The actual collection contains `expected`.
    pub fn to_contain(self, expected: U) -> Result<(), Failure> {
        let actual_repr = format!("{:?}", self.actual);
        let holds = self.actual.into_iter().any(|item| item == expected);
        finish(
            &self.log,
            self.negated,
            holds,
            actual_repr,
            "contain",
            &format!("{expected:?}"),
        )
    }
}

impl<T: Debug> Expectation<Option<T>> {
    pub fn to_be_some(self) -> Result<(), Failure> {
        let holds = self.actual.is_some();
        self.verdict(holds, "be", "Some(_)")
    }

    pub fn to_be_none(self) -> Result<(), Failure> {
        let holds = self.actual.is_none();
        self.verdict(holds, "be", "None")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn two_plus_two_is_four() {
        let cx = TestCx::new();
        assert!(cx.expect(2 + 2).to_be(4).is_ok());
        assert!(cx.expect(2 + 2).not().to_be(0).is_ok());
        assert_eq!(cx.log().executed(), 2);
    }

    #[test]
    fn failed_equality_carries_expected_and_actual() {
        let cx = TestCx::new();
        let failure = cx.expect(4).to_be(5).unwrap_err();
        assert_eq!(failure.message, "expected 4 to be 5");
        assert_eq!(failure.expected.as_deref(), Some("5"));
        assert_eq!(failure.actual.as_deref(), Some("4"));
    }

    #[test]
    fn negated_match_fails_when_the_pattern_matches() {
        let cx = TestCx::new();
        assert!(cx.expect("team").not().to_match("I").is_ok());
        assert!(cx.expect("Christoph").to_match("stop").is_ok());
        let failure = cx.expect("Christoph").not().to_match("stop").unwrap_err();
        assert_eq!(failure.message, "expected \"Christoph\" not to match \"stop\"");
    }

    #[test]
    fn invalid_pattern_is_a_body_failure_not_an_assertion() {
        let cx = TestCx::new();
        let failure = cx.expect("team").to_match("(unclosed").unwrap_err();
        assert_eq!(failure.kind, crucible_types::FailureKind::Body);
        // Still counts as one evaluation for the plan guard.
        assert_eq!(cx.log().executed(), 1);
    }

    #[test]
    fn ordering_and_proximity_matchers() {
        let cx = TestCx::new();
        let value = 2 + 2;
        assert!(cx.expect(value).to_be_greater_than(3).is_ok());
        assert!(cx.expect(value).to_be_greater_or_equal(4).is_ok());
        assert!(cx.expect(value).to_be_less_than(5).is_ok());
        assert!(cx.expect(value).to_be_less_or_equal(4).is_ok());
        assert!(cx.expect(0.1 + 0.2).to_be_close_to(0.3, 5).is_ok());
        assert!(cx.expect(0.1 + 0.2).to_be_close_to(0.4, 5).is_err());
    }

    #[test]
    fn shopping_list_contains_beer() {
        let cx = TestCx::new();
        let shopping_list = vec!["diapers", "kleenex", "trash bags", "paper towels", "beer"];
        assert!(cx.expect(shopping_list.clone()).to_contain("beer").is_ok());
        assert!(cx.expect(shopping_list).to_contain("wine").is_err());
    }

    #[test]
    fn option_matchers() {
        let cx = TestCx::new();
        assert!(cx.expect(Some(1)).to_be_some().is_ok());
        assert!(cx.expect(None::<i32>).to_be_none().is_ok());
        assert!(cx.expect(Some(1)).not().to_be_none().is_ok());
    }

    #[test]
    fn plan_mismatch_is_an_assertion_failure() {
        let cx = TestCx::new();
        cx.plan_assertions(1);
        let failure = cx.log().check_plan().unwrap_err();
        assert_eq!(
            failure.message,
            "expected 1 assertion(s) to be evaluated, but 0 were"
        );

        let _ = cx.expect(1).to_be(1);
        assert!(cx.log().check_plan().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn expect_resolves_yields_the_value() {
        let cx = TestCx::new();
        let value = Deferred::<_, Failure>::resolve_after(Duration::from_secs(1), "peanut butter");
        cx.expect_resolves(value)
            .await
            .expect("should resolve")
            .to_be("peanut butter")
            .expect("should match");
        assert_eq!(cx.log().executed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expect_rejects_counts_an_unexpected_resolution() {
        let cx = TestCx::new();
        let value = Deferred::<_, String>::resolve_after(Duration::from_secs(1), "peanut butter");
        let failure = cx.expect_rejects(value).await.unwrap_err();
        assert!(failure.message.contains("expected deferred to reject"));
        assert_eq!(cx.log().executed(), 1);
    }
}
