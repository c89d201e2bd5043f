//! The bundled demonstration suite: one case per completion style, plus
//! scoped fixtures and a mock-driven case.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crucible_core::{Deferred, MockFn};
use crucible_engine::Suite;

/// Resolves with "peanut butter" after a short delay.
fn fetch_deferred() -> Deferred<String, String> {
    Deferred::resolve_after(Duration::from_millis(100), "peanut butter".to_string())
}

/// Rejects with "error" after a short delay.
fn fetch_deferred_error() -> Deferred<String, String> {
    Deferred::reject_after(Duration::from_millis(100), "error".to_string())
}

/// Callback-style fetch: hands the data to the callback off-task.
fn fetch_data(callback: impl FnOnce(String) + Send + 'static) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        callback("peanut butter".to_string());
    });
}

/// Applies `callback` to every item, recording each call.
fn for_each(items: &[i64], callback: &MockFn<i64, i64>) {
    for item in items {
        callback.call(*item);
    }
}

pub fn suite() -> Suite {
    Suite::build("crucible demo", |s| {
        s.test("two plus two is four", |cx| cx.expect(2 + 2).to_be(4));

        s.describe("callbacks", |d| {
            d.test_with_done("the data is peanut butter", |cx, done| {
                fetch_data(move |data| {
                    done.settle(cx.expect(data).to_be("peanut butter".to_string()));
                });
            });
        });

        s.describe("deferred values", |d| {
            d.test_async("the data is peanut butter", |cx| async move {
                let data = fetch_deferred().await?;
                cx.expect(data).to_be("peanut butter".to_string())
            });
            d.test_async("the fetch fails with an error", |cx| async move {
                cx.plan_assertions(1);
                cx.expect_rejects(fetch_deferred_error())
                    .await?
                    .to_match("error")
            });
        });

        let cities: Arc<Mutex<Vec<String>>> = Arc::default();
        let db = Arc::clone(&cities);
        s.describe("city database", move |d| {
            let setup = Arc::clone(&db);
            d.before_all_async(move || {
                let setup = Arc::clone(&setup);
                async move {
                    // Stands in for connecting to a real database.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    *setup.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
                        vec!["Tokyo".to_string(), "Delhi".to_string()];
                    Ok(())
                }
            });
            let lookup = Arc::clone(&db);
            d.test("has Tokyo", move |cx| {
                let is_city = lookup
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .contains(&"Tokyo".to_string());
                cx.expect(is_city).to_be(true)
            });
            let lookup = Arc::clone(&db);
            d.test("has not Cairo", move |cx| {
                let is_city = lookup
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .contains(&"Cairo".to_string());
                cx.expect(is_city).to_be(false)
            });
        });

        s.describe("mock functions", |d| {
            d.test("records every call and result", |cx| {
                let callback = MockFn::returning(|x: &i64| x + 42);
                for_each(&[0, 1], &callback);

                cx.expect(callback.call_count()).to_be(2)?;
                cx.expect(callback.nth_call(0)).to_be(Some(0))?;
                cx.expect(callback.nth_call(1)).to_be(Some(1))?;
                cx.expect(callback.nth_result(1)).to_be(Some(43))
            });
        });
    })
}
