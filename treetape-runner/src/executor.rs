// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wraps test bodies so that every failure mode ends the test.
//!
//! A test body is an async function taking a [`TestContext`]. It reports success or failure
//! through assertions, and finishes by calling [`TestContext::done`]. If the body instead returns
//! an error, or panics while being called or polled, [`TestExec::run`] records the failure and
//! calls `done` on its behalf, so the harness is never left waiting on a crashed test.

use crate::harness::{AssertionError, AssertionOutcome, HarnessContext};
use debug_ignore::DebugIgnore;
use futures::{FutureExt, future::BoxFuture};
use std::{
    any::Any,
    error, fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::debug;

/// The error type returned by test bodies.
pub type TestBodyError = Box<dyn error::Error + Send + Sync>;

/// The result type returned by test bodies.
pub type TestResult = Result<(), TestBodyError>;

/// A shareable test body.
#[derive(Clone)]
pub struct TestFn {
    inner: Arc<dyn Fn(TestContext) -> BoxFuture<'static, TestResult> + Send + Sync>,
}

impl TestFn {
    /// Creates a new test body out of an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |ctx| f(ctx).boxed()),
        }
    }

    fn call(&self, ctx: TestContext) -> BoxFuture<'static, TestResult> {
        (self.inner)(ctx)
    }
}

impl fmt::Debug for TestFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TestFn")
    }
}

/// What a test body did when it was run.
///
/// This only describes the body itself: a body that returns `Ok` may still have recorded failing
/// assertions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestOutcome {
    /// The body returned `Ok`.
    Completed,

    /// The body returned an error.
    Failed(AssertionError),

    /// The body panicked, either while being called or while being polled.
    Panicked(String),
}

/// A test body bound to its name, ready to be handed to a harness.
#[derive(Clone, Debug)]
pub struct TestExec {
    name: String,
    f: DebugIgnore<TestFn>,
}

impl TestExec {
    /// Creates a new `TestExec`.
    pub fn new(name: impl Into<String>, f: TestFn) -> Self {
        Self {
            name: name.into(),
            f: DebugIgnore(f),
        }
    }

    /// The name of the test.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the test body against a harness context.
    ///
    /// If the body fails, a failing assertion is recorded and the test is ended with
    /// [`TestContext::done`].
    pub async fn run(self, harness: Arc<dyn HarnessContext>) -> TestOutcome {
        let ctx = TestContext::new(harness);

        let call = AssertUnwindSafe(|| self.f.call(ctx.clone()));
        let future = match std::panic::catch_unwind(call) {
            Ok(future) => future,
            Err(payload) => return ctx.body_panicked(&self.name, payload),
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => TestOutcome::Completed,
            Ok(Err(error)) => {
                debug!(test = %self.name, %error, "test body returned an error");
                let error = AssertionError::from_error(&*error);
                ctx.record(
                    AssertionOutcome::new(false, "fail", error.message.clone())
                        .with_error(error.clone()),
                );
                ctx.done();
                TestOutcome::Failed(error)
            }
            Err(payload) => ctx.body_panicked(&self.name, payload),
        }
    }
}

/// The context passed to a test body.
///
/// Wraps the harness's [`HarnessContext`] with assertion primitives and an expected assertion
/// count. Cloning a `TestContext` yields another handle to the same test.
#[derive(Clone, Debug)]
pub struct TestContext {
    harness: Arc<dyn HarnessContext>,
    // 0 means no expectation was declared.
    expected: Arc<AtomicUsize>,
}

impl TestContext {
    /// Creates a new context around a harness context.
    pub fn new(harness: Arc<dyn HarnessContext>) -> Self {
        Self {
            harness,
            expected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The name of the test.
    pub fn name(&self) -> &str {
        self.harness.name()
    }

    /// The number of assertions recorded so far.
    pub fn assert_count(&self) -> usize {
        self.harness.assert_count()
    }

    /// Declares how many assertions this test is expected to make.
    ///
    /// Checked by [`done`](Self::done). An expectation of 0 disables the check.
    pub fn expect(&self, count: usize) {
        self.expected.store(count, Ordering::SeqCst);
    }

    /// Finishes the test.
    ///
    /// If an assertion count was declared with [`expect`](Self::expect) and a different number
    /// of assertions was recorded, a failing assertion is recorded first. Each call ends the test
    /// once: calling this more than once is a protocol error, reported by the reducer.
    pub fn done(&self) {
        let expected = self.expected.load(Ordering::SeqCst);
        let actual = self.assert_count();
        if expected > 0 && actual != expected {
            self.fail(format!("Expected {expected} assertions, but {actual} were run."));
        }
        self.harness.end();
    }

    /// Ends the test without checking the expected assertion count.
    pub fn end(&self) {
        self.harness.end();
    }

    /// Asserts that `value` is true.
    pub fn ok(&self, value: bool, name: impl Into<String>) -> bool {
        self.record(
            AssertionOutcome::new(value, "ok", name).with_values(value.to_string(), "true"),
        );
        value
    }

    /// Asserts that `value` is false.
    pub fn not_ok(&self, value: bool, name: impl Into<String>) -> bool {
        self.record(
            AssertionOutcome::new(!value, "not_ok", name).with_values(value.to_string(), "false"),
        );
        !value
    }

    /// Asserts that `actual == expected`.
    pub fn equal<T>(&self, actual: T, expected: T, name: impl Into<String>) -> bool
    where
        T: PartialEq + fmt::Debug,
    {
        let ok = actual == expected;
        self.record(
            AssertionOutcome::new(ok, "equal", name)
                .with_values(format!("{actual:?}"), format!("{expected:?}")),
        );
        ok
    }

    /// Alias for [`equal`](Self::equal).
    pub fn equals<T>(&self, actual: T, expected: T, name: impl Into<String>) -> bool
    where
        T: PartialEq + fmt::Debug,
    {
        self.equal(actual, expected, name)
    }

    /// Asserts that `actual != expected`.
    pub fn not_equal<T>(&self, actual: T, expected: T, name: impl Into<String>) -> bool
    where
        T: PartialEq + fmt::Debug,
    {
        let ok = actual != expected;
        self.record(
            AssertionOutcome::new(ok, "not_equal", name)
                .with_values(format!("{actual:?}"), format!("{expected:?}")),
        );
        ok
    }

    /// Records a passing assertion.
    pub fn pass(&self, name: impl Into<String>) {
        self.record(AssertionOutcome::new(true, "pass", name));
    }

    /// Records a failing assertion.
    pub fn fail(&self, name: impl Into<String>) {
        self.record(AssertionOutcome::new(false, "fail", name));
    }

    /// Asserts that `result` is not an error.
    pub fn error<T, E>(&self, result: &Result<T, E>, name: impl Into<String>) -> bool
    where
        E: error::Error + 'static,
    {
        match result {
            Ok(_) => {
                self.record(AssertionOutcome::new(true, "error", name));
                true
            }
            Err(error) => {
                self.record(
                    AssertionOutcome::new(false, "error", name)
                        .with_error(AssertionError::from_error(error)),
                );
                false
            }
        }
    }

    fn record(&self, outcome: AssertionOutcome) {
        self.harness.record(outcome);
    }

    fn body_panicked(&self, test_name: &str, payload: Box<dyn Any + Send>) -> TestOutcome {
        let message = panic_message(&*payload);
        debug!(test = %test_name, %message, "test body panicked");
        self.record(
            AssertionOutcome::new(false, "fail", format!("test panicked: {message}"))
                .with_error(AssertionError::from_message(message.clone())),
        );
        self.done();
        TestOutcome::Panicked(message)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "(non-string panic payload)".to_owned()
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use crate::harness::TestId;
    use std::sync::Mutex;

    /// A harness context that records everything in memory.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingContext {
        pub(crate) assertions: Mutex<Vec<AssertionOutcome>>,
        pub(crate) ends: AtomicUsize,
    }

    impl RecordingContext {
        pub(crate) fn assertions(&self) -> Vec<(bool, String)> {
            self.assertions
                .lock()
                .unwrap()
                .iter()
                .map(|outcome| (outcome.ok, outcome.name.clone()))
                .collect()
        }

        pub(crate) fn ends(&self) -> usize {
            self.ends.load(Ordering::SeqCst)
        }
    }

    impl HarnessContext for RecordingContext {
        fn test_id(&self) -> TestId {
            TestId(0)
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn record(&self, mut outcome: AssertionOutcome) {
            let mut assertions = self.assertions.lock().unwrap();
            outcome.id = assertions.len();
            assertions.push(outcome);
        }

        fn end(&self) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }

        fn assert_count(&self) -> usize {
            self.assertions.lock().unwrap().len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_helpers::RecordingContext, *};
    use pretty_assertions::assert_eq;
    use std::io;

    async fn run(f: TestFn) -> (Arc<RecordingContext>, TestOutcome) {
        let harness = Arc::new(RecordingContext::default());
        let outcome = TestExec::new("test", f).run(harness.clone()).await;
        (harness, outcome)
    }

    #[tokio::test]
    async fn passing_body_ends_itself() {
        let (harness, outcome) = run(TestFn::new(|t| async move {
            t.equal(1 + 1, 2, "adds");
            t.done();
            Ok(())
        }))
        .await;
        assert_eq!(outcome, TestOutcome::Completed);
        assert_eq!(harness.assertions(), vec![(true, "adds".to_owned())]);
        assert_eq!(harness.ends(), 1);
    }

    #[tokio::test]
    async fn error_is_recorded_and_test_ended() {
        let (harness, outcome) = run(TestFn::new(|_t| async move {
            let result: TestResult = Err(io::Error::other("disk on fire").into());
            result
        }))
        .await;
        assert_eq!(
            outcome,
            TestOutcome::Failed(AssertionError::from_message("disk on fire"))
        );
        assert_eq!(harness.assertions(), vec![(false, "disk on fire".to_owned())]);
        assert_eq!(harness.ends(), 1);
    }

    #[tokio::test]
    async fn synchronous_panic_is_recorded_and_test_ended() {
        fn boom(_t: TestContext) -> futures::future::Ready<TestResult> {
            panic!("thrown before the future existed")
        }

        let (harness, outcome) = run(TestFn::new(boom)).await;
        assert_eq!(
            outcome,
            TestOutcome::Panicked("thrown before the future existed".to_owned())
        );
        assert_eq!(
            harness.assertions(),
            vec![(
                false,
                "test panicked: thrown before the future existed".to_owned()
            )]
        );
        assert_eq!(harness.ends(), 1);
    }

    #[tokio::test]
    async fn panic_while_polled_is_recorded_and_test_ended() {
        let (harness, outcome) = run(TestFn::new(|t| async move {
            t.pass("before the panic");
            let value: Option<u32> = None;
            t.equal(value.expect("value was missing"), 1, "unreachable");
            Ok(())
        }))
        .await;
        assert_eq!(outcome, TestOutcome::Panicked("value was missing".to_owned()));
        assert_eq!(
            harness.assertions(),
            vec![
                (true, "before the panic".to_owned()),
                (false, "test panicked: value was missing".to_owned()),
            ]
        );
        assert_eq!(harness.ends(), 1);
    }

    #[tokio::test]
    async fn expect_mismatch_fails_on_done() {
        let (harness, outcome) = run(TestFn::new(|t| async move {
            t.expect(3);
            t.ok(true, "one");
            t.ok(true, "two");
            t.done();
            Ok(())
        }))
        .await;
        assert_eq!(outcome, TestOutcome::Completed);
        assert_eq!(
            harness.assertions(),
            vec![
                (true, "one".to_owned()),
                (true, "two".to_owned()),
                (false, "Expected 3 assertions, but 2 were run.".to_owned()),
            ]
        );
        assert_eq!(harness.ends(), 1);
    }

    #[tokio::test]
    async fn expect_met_and_expect_zero_pass() {
        let (harness, _) = run(TestFn::new(|t| async move {
            t.expect(1);
            t.not_ok(false, "falsy");
            t.done();
            Ok(())
        }))
        .await;
        assert_eq!(harness.assertions(), vec![(true, "falsy".to_owned())]);

        let (harness, _) = run(TestFn::new(|t| async move {
            t.expect(0);
            t.done();
            Ok(())
        }))
        .await;
        assert_eq!(harness.assertions(), vec![]);
        assert_eq!(harness.ends(), 1);
    }

    #[tokio::test]
    async fn equals_records_like_equal() {
        let (harness, _) = run(TestFn::new(|t| async move {
            assert!(t.equals(2, 2, "same"));
            assert!(!t.equals("x", "y", "different"));
            t.done();
            Ok(())
        }))
        .await;

        let assertions = harness.assertions.lock().unwrap().clone();
        let summary: Vec<_> = assertions
            .iter()
            .map(|outcome| (outcome.ok, outcome.operator.as_str(), outcome.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            [(true, "equal", "same"), (false, "equal", "different")]
        );
        assert_eq!(assertions[1].actual.as_deref(), Some("\"x\""));
    }

    #[tokio::test]
    async fn comparison_primitives_record_values() {
        let (harness, _) = run(TestFn::new(|t| async move {
            t.equal("a", "b", "strings differ");
            t.not_equal(1, 2, "numbers differ");
            let parsed: Result<u32, _> = "x".parse::<u32>();
            t.error(&parsed, "parses");
            t.done();
            Ok(())
        }))
        .await;

        let assertions = harness.assertions.lock().unwrap().clone();
        assert_eq!(assertions.len(), 3);
        assert!(!assertions[0].ok);
        assert_eq!(assertions[0].actual.as_deref(), Some("\"a\""));
        assert_eq!(assertions[0].expected.as_deref(), Some("\"b\""));
        assert!(assertions[1].ok);
        assert_eq!(assertions[1].operator, "not_equal");
        assert!(!assertions[2].ok);
        assert_eq!(
            assertions[2].error.as_ref().map(|error| error.message.as_str()),
            Some("invalid digit found in string")
        );
    }
}
