//! Unit tests for the engine crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crucible_core::{Deferred, MockFn, MockInstances, SubstitutionRegistry, deferred};
use crucible_types::{FailureKind, Outcome};

use crate::config::RunConfig;
use crate::gate::{self, TestCase};
use crate::runner::SuiteRunner;
use crate::suite::Suite;

fn test_config() -> RunConfig {
    RunConfig {
        case_timeout: Duration::from_secs(5),
        signal_grace: Duration::from_millis(50),
        report_path: None,
    }
}

// ---- shared fixtures ----

/// Resolves with "peanut butter" after a delay.
fn fetch_promise() -> Deferred<String, String> {
    Deferred::resolve_after(Duration::from_secs(1), "peanut butter".to_string())
}

/// Rejects with "error" after a delay.
fn fetch_promise_error() -> Deferred<String, String> {
    Deferred::reject_after(Duration::from_secs(1), "error".to_string())
}

/// Callback-style fetch: hands "peanut butter" to the callback after a delay.
fn fetch_data(callback: impl FnOnce(String) + Send + 'static) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        callback("peanut butter".to_string());
    });
}

fn recorder(log: &Arc<Mutex<Vec<String>>>, entry: &'static str) -> impl Fn() + Send + Sync + use<> {
    let log = Arc::clone(log);
    move || log.lock().unwrap().push(entry.to_string())
}

// ---- gate: synchronous bodies ----

#[tokio::test]
async fn sync_body_returning_ok_passes() {
    let case = TestCase::sync("two plus two is four", |cx| cx.expect(2 + 2).to_be(4));
    assert_eq!(gate::run_case(case, &test_config()).await, Outcome::Passed);
}

#[tokio::test]
async fn sync_body_error_fails_with_that_reason() {
    let case = TestCase::sync("failing equality", |cx| cx.expect(2 + 2).to_be(5));
    let outcome = gate::run_case(case, &test_config()).await;
    let failure = outcome.failure().expect("should fail");
    assert_eq!(failure.kind, FailureKind::Assertion);
    assert_eq!(failure.message, "expected 4 to be 5");
}

#[tokio::test]
async fn sync_body_panic_is_a_body_failure() {
    let case = TestCase::sync("compiling android goes as expected", |_cx| {
        panic!("you are using the wrong JDK")
    });
    let outcome = gate::run_case(case, &test_config()).await;
    let failure = outcome.failure().expect("should fail");
    assert_eq!(failure.kind, FailureKind::Body);
    assert_eq!(failure.message, "you are using the wrong JDK");
}

// ---- gate: callback-style completion ----

#[tokio::test(start_paused = true)]
async fn callback_invoked_once_cleanly_passes() {
    let case = TestCase::callback("the data is peanut butter", |cx, done| {
        fetch_data(move |data| {
            done.settle(cx.expect(data).to_be("peanut butter".to_string()));
        });
    });
    assert_eq!(gate::run_case(case, &test_config()).await, Outcome::Passed);
}

#[tokio::test(start_paused = true)]
async fn callback_carrying_an_assertion_failure_fails() {
    let case = TestCase::callback("the data is not jam", |cx, done| {
        fetch_data(move |data| {
            done.settle(cx.expect(data).to_be("jam".to_string()));
        });
    });
    let outcome = gate::run_case(case, &test_config()).await;
    let failure = outcome.failure().expect("should fail");
    assert_eq!(failure.kind, FailureKind::Assertion);
    assert_eq!(failure.expected.as_deref(), Some("\"jam\""));
}

#[tokio::test(start_paused = true)]
async fn callback_invoked_twice_is_a_protocol_violation() {
    // The violation holds independent of the arguments on either call.
    let case = TestCase::callback("double completion", |_cx, done| {
        done.pass();
        done.fail("second call");
    });
    let outcome = gate::run_case(case, &test_config()).await;
    let failure = outcome.failure().expect("should fail");
    assert_eq!(failure.kind, FailureKind::ProtocolViolation);
}

#[tokio::test(start_paused = true)]
async fn callback_never_invoked_times_out() {
    let case = TestCase::callback("forgets to signal", |_cx, done| {
        // Production function drops the callback without calling it.
        drop(done);
    });
    let outcome = gate::run_case(case, &test_config()).await;
    assert_eq!(outcome, Outcome::TimedOut { limit_ms: 5000 });
}

#[tokio::test(start_paused = true)]
async fn signal_arriving_after_the_timeout_is_ignored() {
    let case = TestCase::callback("signals too late", |_cx, done| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            done.pass();
        });
    });
    let outcome = gate::run_case(case, &test_config()).await;
    // No resurrection: the case stays timed out.
    assert_eq!(outcome, Outcome::TimedOut { limit_ms: 5000 });
}

// ---- gate: future-style completion ----

#[tokio::test(start_paused = true)]
async fn resolved_future_with_matching_assertion_passes() {
    let case = TestCase::future("the data is peanut butter", |cx| async move {
        let data = fetch_promise().await?;
        cx.expect(data).to_be("peanut butter".to_string())
    });
    assert_eq!(gate::run_case(case, &test_config()).await, Outcome::Passed);
}

#[tokio::test(start_paused = true)]
async fn unhandled_rejection_fails_with_the_rejection_reason() {
    let case = TestCase::future("the fetch fails with an error", |_cx| async move {
        let _data = fetch_promise_error().await?;
        Ok(())
    });
    let outcome = gate::run_case(case, &test_config()).await;
    let failure = outcome.failure().expect("should fail");
    assert_eq!(failure.kind, FailureKind::Body);
    assert_eq!(failure.message, "error");
}

#[tokio::test(start_paused = true)]
async fn handled_rejection_with_matching_assertion_passes() {
    let case = TestCase::future("the fetch fails with an error", |cx| async move {
        cx.plan_assertions(1);
        match fetch_promise_error().await {
            Ok(_) => Ok(()), // the plan guard catches this branch
            Err(reason) => cx.expect(reason).to_match("error"),
        }
    });
    assert_eq!(gate::run_case(case, &test_config()).await, Outcome::Passed);
}

#[tokio::test(start_paused = true)]
async fn plan_guard_catches_a_rejection_branch_that_never_ran() {
    // The operation unexpectedly succeeds, so the handler never evaluates its
    // one planned assertion; the count mismatch is the only signal.
    let case = TestCase::future("the fetch unexpectedly succeeds", |cx| async move {
        cx.plan_assertions(1);
        if let Err(reason) = fetch_promise().await {
            return cx.expect(reason).to_match("error");
        }
        Ok(())
    });
    let outcome = gate::run_case(case, &test_config()).await;
    let failure = outcome.failure().expect("should fail");
    assert_eq!(failure.kind, FailureKind::Assertion);
    assert_eq!(
        failure.message,
        "expected 1 assertion(s) to be evaluated, but 0 were"
    );
}

#[tokio::test(start_paused = true)]
async fn resolves_and_rejects_helpers_mirror_the_handler_forms() {
    let case = TestCase::future("resolves to peanut butter", |cx| async move {
        cx.expect_resolves(fetch_promise())
            .await?
            .to_be("peanut butter".to_string())
    });
    assert_eq!(gate::run_case(case, &test_config()).await, Outcome::Passed);

    let case = TestCase::future("rejects with an error", |cx| async move {
        cx.plan_assertions(1);
        cx.expect_rejects(fetch_promise_error()).await?.to_match("error")
    });
    assert_eq!(gate::run_case(case, &test_config()).await, Outcome::Passed);
}

#[tokio::test(start_paused = true)]
async fn future_that_never_settles_times_out() {
    let case = TestCase::future("never settles", |_cx| async move {
        let (value, settler) = deferred::<(), String>();
        drop(settler);
        value.await?;
        Ok(())
    });
    let outcome = gate::run_case(case, &test_config()).await;
    assert_eq!(outcome, Outcome::TimedOut { limit_ms: 5000 });
}

#[tokio::test(start_paused = true)]
async fn panicking_future_is_a_body_failure() {
    let case = TestCase::future("panics mid-await", |_cx| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        panic!("boom");
    });
    let outcome = gate::run_case(case, &test_config()).await;
    let failure = outcome.failure().expect("should fail");
    assert_eq!(failure.kind, FailureKind::Body);
    assert_eq!(failure.message, "boom");
}

// ---- runner: scopes and hooks ----

#[tokio::test(start_paused = true)]
async fn nested_scopes_run_hooks_outer_in_inner_out() {
    let log: Arc<Mutex<Vec<String>>> = Arc::default();

    let suite = Suite::build("scoping", |s| {
        s.before_all(recorder(&log, "1 - beforeAll"));
        s.before_each(recorder(&log, "1 - beforeEach"));
        s.after_all(recorder(&log, "1 - afterAll"));
        s.after_each(recorder(&log, "1 - afterEach"));
        let l = Arc::clone(&log);
        s.test("", move |_cx| {
            l.lock().unwrap().push("1 - test".to_string());
            Ok(())
        });

        let outer_log = Arc::clone(&log);
        s.describe("Scoped / Nested block", move |d| {
            d.before_all(recorder(&outer_log, "2 - beforeAll"));
            d.before_each(recorder(&outer_log, "2 - beforeEach"));
            d.after_all(recorder(&outer_log, "2 - afterAll"));
            d.after_each(recorder(&outer_log, "2 - afterEach"));
            let l = Arc::clone(&outer_log);
            d.test("", move |_cx| {
                l.lock().unwrap().push("2 - test".to_string());
                Ok(())
            });
        });
    });

    let report = SuiteRunner::new(test_config()).run(suite).await;
    assert!(report.all_passed(), "report: {report:?}");

    let entries = log.lock().unwrap().clone();
    assert_eq!(
        entries,
        vec![
            "1 - beforeAll",
            "1 - beforeEach",
            "1 - test",
            "1 - afterEach",
            "2 - beforeAll",
            "1 - beforeEach",
            "2 - beforeEach",
            "2 - test",
            "2 - afterEach",
            "1 - afterEach",
            "2 - afterAll",
            "1 - afterAll",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn async_once_hooks_complete_before_and_after_the_cases() {
    let cities: Arc<Mutex<Vec<String>>> = Arc::default();

    let suite = Suite::build("city", |s| {
        let db = Arc::clone(&cities);
        s.before_all_async(move || {
            let db = Arc::clone(&db);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                *db.lock().unwrap() = vec![
                    "Tokyo".to_string(),
                    "Delhi".to_string(),
                    "Shanghai".to_string(),
                ];
                Ok(())
            }
        });

        let db = Arc::clone(&cities);
        s.test("city database has Tokyo", move |cx| {
            let is_city = db.lock().unwrap().contains(&"Tokyo".to_string());
            cx.expect(is_city).to_be(true)
        });
        let db = Arc::clone(&cities);
        s.test("city database has not Cairo", move |cx| {
            let is_city = db.lock().unwrap().contains(&"Cairo".to_string());
            cx.expect(is_city).to_be(false)
        });

        let db = Arc::clone(&cities);
        s.after_all_async(move || {
            let db = Arc::clone(&db);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                db.lock().unwrap().clear();
                Ok(())
            }
        });
    });

    let report = SuiteRunner::new(test_config()).run(suite).await;
    assert!(report.all_passed(), "report: {report:?}");
    assert!(cities.lock().unwrap().is_empty(), "after_all must have run");
}

#[tokio::test(start_paused = true)]
async fn failed_before_all_fails_every_case_in_scope_without_running_bodies() {
    let body_ran = Arc::new(AtomicBool::new(false));

    let suite = Suite::build("broken setup", |s| {
        s.test("outside the broken scope", |_cx| Ok(()));
        let flag = Arc::clone(&body_ran);
        s.describe("broken", move |d| {
            d.before_all(|| panic!("database down"));
            let flag = Arc::clone(&flag);
            d.test("first", move |_cx| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            });
            d.test("second", |_cx| Ok(()));
        });
    });

    let report = SuiteRunner::new(test_config()).run(suite).await;
    assert_eq!(report.passed(), 1);
    assert_eq!(report.failed(), 2);
    assert!(!body_ran.load(Ordering::SeqCst), "bodies must not run");
    for case in report.cases.iter().filter(|c| c.path == ["broken"]) {
        let failure = case.outcome.failure().expect("should fail");
        assert_eq!(failure.message, "database down");
    }
}

#[tokio::test(start_paused = true)]
async fn failed_before_each_fails_the_case_without_running_its_body() {
    let body_ran = Arc::new(AtomicBool::new(false));

    let suite = Suite::build("broken per-test setup", |s| {
        s.before_each(|| panic!("fixture missing"));
        let flag = Arc::clone(&body_ran);
        s.test("skipped body", move |_cx| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
    });

    let report = SuiteRunner::new(test_config()).run(suite).await;
    assert_eq!(report.failed(), 1);
    assert!(!body_ran.load(Ordering::SeqCst));
    let failure = report.cases[0].outcome.failure().expect("should fail");
    assert_eq!(failure.message, "fixture missing");
}

#[tokio::test(start_paused = true)]
async fn failed_after_each_fails_an_otherwise_passing_case() {
    let suite = Suite::build("broken teardown", |s| {
        s.after_each(|| panic!("teardown failed"));
        s.test("passes until teardown", |_cx| Ok(()));
    });

    let report = SuiteRunner::new(test_config()).run(suite).await;
    let failure = report.cases[0].outcome.failure().expect("should fail");
    assert_eq!(failure.message, "teardown failed");
}

#[tokio::test(start_paused = true)]
async fn report_carries_scope_paths_and_counts_timeouts_as_failures() {
    let suite = Suite::build("mixed", |s| {
        s.describe("Promises", |d| {
            d.test_async("the data is peanut butter", |cx| async move {
                let data = fetch_promise().await?;
                cx.expect(data).to_be("peanut butter".to_string())
            });
        });
        s.test_with_done("never signals", |_cx, done| drop(done));
    });

    let report = SuiteRunner::new(test_config()).run(suite).await;
    assert_eq!(report.cases.len(), 2);
    assert_eq!(
        report.cases[0].full_name(),
        "Promises > the data is peanut butter"
    );
    assert_eq!(report.cases[0].outcome, Outcome::Passed);
    assert_eq!(
        report.cases[1].outcome,
        Outcome::TimedOut { limit_ms: 5000 }
    );
    assert_eq!(report.passed(), 1);
    assert_eq!(report.failed(), 1);
}

// ---- runner: blocking entry point ----

#[test]
fn run_blocking_drives_a_suite_on_a_current_thread_runtime() {
    let suite = Suite::build("blocking", |s| {
        s.test_async("quick resolution", |cx| async move {
            let value =
                Deferred::<_, String>::resolve_after(Duration::from_millis(10), 42);
            let resolved = value.await?;
            cx.expect(resolved).to_be(42)
        });
    });

    let report = SuiteRunner::new(test_config())
        .run_blocking(suite)
        .expect("runtime builds");
    assert!(report.all_passed(), "report: {report:?}");
}

// ---- mocks wired through explicit substitution ----

#[derive(Default)]
struct RecordedSoundPlayer {
    play_file: MockFn<String, ()>,
}

struct SoundPlayerConsumer {
    player: Arc<RecordedSoundPlayer>,
}

impl SoundPlayerConsumer {
    fn new(player: Arc<RecordedSoundPlayer>) -> Self {
        Self { player }
    }

    fn play_something_cool(&self) {
        self.player.play_file.call("song.mp3".to_string());
    }
}

#[test]
fn substituted_sound_player_records_constructions_and_calls() {
    let registry = SubstitutionRegistry::new();
    registry.substitute(
        "sound-player",
        Arc::new(MockInstances::<RecordedSoundPlayer>::new()),
    );

    // Composition consults the registry instead of any global lookup table.
    let factory = registry
        .lookup::<MockInstances<RecordedSoundPlayer>>("sound-player")
        .expect("stand-in registered");
    assert_eq!(factory.constructed(), 0);

    let consumer = SoundPlayerConsumer::new(factory.construct(RecordedSoundPlayer::default()));
    assert_eq!(factory.constructed(), 1);

    consumer.play_something_cool();
    let player = factory.instance(0).expect("first constructed instance");
    assert_eq!(player.play_file.call_count(), 1);
    assert_eq!(player.play_file.nth_call(0).as_deref(), Some("song.mp3"));

    factory.clear();
    assert_eq!(factory.constructed(), 0);
}
