// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TreeRunner`].

use crate::{
    config::RunConfig,
    errors::RunError,
    flatten::{FlatSuite, flatten},
    harness::{Harness, HarnessSession, TapeHarness},
    loader::{FileDescriptor, SuiteLoader},
    reducer::ReduceEvents,
    reporter::{RunStats, SuiteReport, TestReporter},
};
use futures::{Stream, StreamExt, stream};
use std::pin::pin;
use tracing::{debug, warn};

/// Drives suites through the whole pipeline: load, flatten, run, reduce and report.
///
/// Suites are run one at a time, in the order their descriptors arrive.
#[derive(Debug)]
pub struct TreeRunner<L, H = TapeHarness> {
    loader: L,
    harness: H,
    config: RunConfig,
    reporter: TestReporter,
    stats: RunStats,
}

impl<L: SuiteLoader> TreeRunner<L> {
    /// Creates a new runner using the built-in [`TapeHarness`].
    pub fn new(loader: L, config: RunConfig, reporter: TestReporter) -> Self {
        Self::with_harness(loader, TapeHarness::new(), config, reporter)
    }
}

impl<L: SuiteLoader, H: Harness> TreeRunner<L, H> {
    /// Creates a new runner using a custom harness.
    pub fn with_harness(
        loader: L,
        harness: H,
        config: RunConfig,
        reporter: TestReporter,
    ) -> Self {
        Self {
            loader,
            harness,
            config,
            reporter,
            stats: RunStats::default(),
        }
    }

    /// Statistics for every suite run so far.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// The loader suites are resolved with.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Runs a suite for each file descriptor, producing one report per suite.
    ///
    /// Each suite is run to completion before the next descriptor is pulled from `files`. An
    /// error for one suite doesn't stop later suites from running.
    pub fn run<'a, S>(
        &'a mut self,
        files: S,
    ) -> impl Stream<Item = Result<SuiteReport, RunError>> + 'a
    where
        S: Stream<Item = FileDescriptor> + 'a,
    {
        stream::unfold((self, Box::pin(files)), |(this, mut files)| async move {
            let file = files.next().await?;
            let result = this.run_file(&file).await;
            Some((result, (this, files)))
        })
    }

    /// Runs suites until the first one fails, then writes a summary.
    ///
    /// Returns [`RunError::SuiteFailed`] naming the first suite that wasn't ok. That suite's
    /// report is written in full, but no further descriptors are consumed.
    pub async fn run_to_completion<S>(&mut self, files: S) -> Result<RunStats, RunError>
    where
        S: Stream<Item = FileDescriptor>,
    {
        let outcome = {
            let mut reports = pin!(self.run(files));
            loop {
                match reports.next().await {
                    Some(Ok(report)) if report.ok => {}
                    Some(Ok(report)) => {
                        warn!(suite = %report.name, "suite failed, aborting run");
                        break Err(RunError::SuiteFailed { name: report.name });
                    }
                    Some(Err(error)) => return Err(error),
                    None => break Ok(()),
                }
            }
        };

        self.reporter
            .write_summary(&self.stats)
            .map_err(RunError::WriteReport)?;
        outcome.map(|()| self.stats)
    }

    /// Loads, flattens and runs the suite for a single descriptor.
    pub async fn run_file(&mut self, file: &FileDescriptor) -> Result<SuiteReport, RunError> {
        let name = file.suite_name();
        debug!(suite = %name, path = %file.path(), "loading suite");
        let tree = self.loader.load(file.path())?;
        let suite = flatten(&tree, &self.config, name);
        self.run_suite(suite).await
    }

    /// Runs an already flattened suite.
    pub async fn run_suite(&mut self, suite: FlatSuite) -> Result<SuiteReport, RunError> {
        let FlatSuite { name, tests } = suite;
        debug!(suite = %name, tests = tests.len(), "running suite");

        let HarnessSession {
            mut registrar,
            events,
        } = self.harness.start_suite(&name);
        for test in tests {
            registrar.register(test.name, test.options, test.exec);
        }
        // Close registration so the event stream can end.
        drop(registrar);

        let mut completed = ReduceEvents::new(events);
        let mut results = Vec::new();
        while let Some(test) = completed.next().await {
            let test = test.map_err(|source| RunError::Protocol {
                suite: name.clone(),
                source,
            })?;
            let report = self
                .reporter
                .report_test(test)
                .map_err(RunError::WriteReport)?;
            results.push(report);
        }

        let report = self
            .reporter
            .report_suite(&name, results)
            .map_err(RunError::WriteReport)?;
        self.stats.on_suite(&report);
        debug!(suite = %name, ok = report.ok, "suite finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::ProtocolViolation,
        executor::TestExec,
        harness::{
            AssertionOutcome, HarnessEvent, HarnessOptions, TestId, TestRegistrar, TestStart,
        },
        loader::SuiteRegistry,
        reporter::{TestReporterBuilder, test_helpers::SharedBuffer},
        tree::TestTree,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn passing(name: &str) -> TestTree {
        TestTree::new().test(name, |t| async move {
            t.ok(true, "passes");
            t.done();
            Ok(())
        })
    }

    fn failing(name: &str) -> TestTree {
        TestTree::new().test(name, |t| async move {
            t.equal(1, 2, "fails");
            t.done();
            Ok(())
        })
    }

    fn registry() -> SuiteRegistry {
        SuiteRegistry::new()
            .register("suites/a.rs", || passing("testA"))
            .register("suites/b.rs", || failing("testB"))
            .register("suites/c.rs", || passing("testC"))
    }

    fn runner<L: SuiteLoader>(loader: L) -> (TreeRunner<L>, SharedBuffer) {
        runner_with_config(loader, RunConfig::default())
    }

    fn runner_with_config<L: SuiteLoader>(
        loader: L,
        config: RunConfig,
    ) -> (TreeRunner<L>, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let reporter = TestReporterBuilder::default().build(buffer.clone());
        (TreeRunner::new(loader, config, reporter), buffer)
    }

    fn files(paths: &[&str]) -> impl Stream<Item = FileDescriptor> + use<> {
        let files: Vec<_> = paths.iter().map(|path| FileDescriptor::new(*path)).collect();
        stream::iter(files)
    }

    #[tokio::test]
    async fn reports_every_suite_in_order() {
        let (mut runner, _) = runner(registry());
        let reports: Vec<_> = runner
            .run(files(&["suites/a.rs", "suites/b.rs", "suites/c.rs"]))
            .collect()
            .await;

        let summary: Vec<_> = reports
            .into_iter()
            .map(|report| {
                let report = report.unwrap();
                (report.name, report.ok)
            })
            .collect();
        assert_eq!(
            summary,
            [
                ("a".to_owned(), true),
                ("b".to_owned(), false),
                ("c".to_owned(), true)
            ]
        );
        assert_eq!(runner.stats().suites_run, 3);
        assert!(!runner.stats().is_success());
    }

    #[tokio::test]
    async fn run_to_completion_stops_at_first_failure() {
        let (mut runner, buffer) = runner(registry());
        let error = runner
            .run_to_completion(files(&["suites/a.rs", "suites/b.rs", "suites/c.rs"]))
            .await
            .unwrap_err();

        assert!(matches!(error, RunError::SuiteFailed { ref name } if name == "b"));
        assert_eq!(runner.stats().suites_run, 2);

        let output = buffer.contents();
        assert!(output.contains("FAIL b (1 test, 1 failed)"), "{output}");
        assert!(!output.contains("testC"), "suite c never ran: {output}");
        assert!(output.contains("Summary: 2 suites run: 1 passed, 1 failed"));
    }

    #[tokio::test]
    async fn run_to_completion_succeeds_when_all_pass() {
        let (mut runner, buffer) = runner(registry());
        let stats = runner
            .run_to_completion(files(&["suites/a.rs", "suites/c.rs"]))
            .await
            .unwrap();
        assert_eq!(stats.suites_passed, 2);
        assert_eq!(stats.tests_passed, 2);
        assert_eq!(stats.assertions, 2);
        assert_eq!(
            buffer.contents(),
            "ok a/testA\n    ok ok(passes)\nok a (1 test)\n\
             ok c/testC\n    ok ok(passes)\nok c (1 test)\n\
             Summary: 2 suites run: 2 passed, 0 failed; 2 tests run: 2 passed, 0 failed; \
             2 assertions\n"
        );
    }

    #[tokio::test]
    async fn empty_input_is_a_successful_run() {
        let (mut runner, _) = runner(registry());
        let stats = runner.run_to_completion(files(&[])).await.unwrap();
        assert_eq!(stats, RunStats::default());
    }

    #[tokio::test]
    async fn unknown_suite_is_a_load_error() {
        let (mut runner, _) = runner(registry());
        let error = runner
            .run_to_completion(files(&["suites/missing.rs"]))
            .await
            .unwrap_err();
        assert!(matches!(error, RunError::LoadSuite(_)));
    }

    #[tokio::test]
    async fn test_only_filters_before_running() {
        let registry = SuiteRegistry::new().register("only.rs", || {
            TestTree::new()
                .test("testFoo", |t| async move {
                    t.pass("ran");
                    t.done();
                    Ok(())
                })
                .test("helper", |t| async move {
                    t.fail("helpers never run");
                    t.done();
                    Ok(())
                })
                .subtree("nested", passing("testBar"))
        });
        let mut config = RunConfig::default();
        config.set_test_only(true);

        let (mut runner, _) = runner_with_config(registry, config);
        let report = runner
            .run_file(&FileDescriptor::new("only.rs"))
            .await
            .unwrap();
        let names: Vec<_> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["only/testFoo", "only/nested/testBar"]);
        assert!(report.ok);
    }

    /// A harness that ignores registrations and replays a fixed event feed.
    struct ScriptedHarness {
        events: Vec<HarnessEvent>,
    }

    struct IgnoreRegistrations;

    impl TestRegistrar for IgnoreRegistrations {
        fn register(&mut self, _name: String, _options: Arc<HarnessOptions>, _exec: TestExec) {}
    }

    impl Harness for ScriptedHarness {
        fn start_suite(&self, _suite_name: &str) -> HarnessSession {
            HarnessSession {
                registrar: Box::new(IgnoreRegistrations),
                events: stream::iter(self.events.clone()).boxed(),
            }
        }
    }

    #[tokio::test]
    async fn protocol_violation_fails_the_suite() {
        let harness = ScriptedHarness {
            events: vec![
                HarnessEvent::Test(TestStart {
                    id: TestId(0),
                    name: "a/testA".to_owned(),
                    skip: false,
                }),
                HarnessEvent::End { test_id: TestId(0) },
                HarnessEvent::Assert {
                    test_id: TestId(0),
                    outcome: AssertionOutcome::new(true, "pass", "late"),
                },
            ],
        };
        let buffer = SharedBuffer::default();
        let reporter = TestReporterBuilder::default().build(buffer.clone());
        let mut runner =
            TreeRunner::with_harness(registry(), harness, RunConfig::default(), reporter);

        let error = runner
            .run_to_completion(files(&["suites/a.rs", "suites/c.rs"]))
            .await
            .unwrap_err();
        match error {
            RunError::Protocol { suite, source } => {
                assert_eq!(suite, "a");
                assert!(matches!(
                    source,
                    ProtocolViolation::AssertionWithoutTest { .. }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        // The test that completed before the violation was still reported.
        assert_eq!(buffer.contents(), "ok a/testA\n");
    }
}
