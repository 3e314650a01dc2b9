// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out and aggregates test results.
//!
//! The main structure in this module is [`TestReporter`].

use crate::{
    harness::AssertionOutcome,
    helpers::{ThemeCharacters, plural},
    reducer::CompletedTest,
};
use debug_ignore::DebugIgnore;
use owo_colors::{OwoColorize, Style};
use serde::Serialize;
use std::io::{self, Write};

/// The report for a single test.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestReport {
    /// The name of the test.
    pub name: String,

    /// True if the harness skipped the test.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,

    /// Every assertion recorded by the test.
    pub assertions: Vec<AssertionOutcome>,

    /// True if every assertion passed. A test without assertions, including a skipped test, is
    /// ok.
    pub ok: bool,
}

impl TestReport {
    /// Builds the report for a completed test.
    pub fn new(test: CompletedTest) -> Self {
        let ok = test.assertions.iter().all(|assertion| assertion.ok);
        Self {
            name: test.name,
            skipped: test.skip,
            assertions: test.assertions,
            ok,
        }
    }
}

/// The report for a suite.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteReport {
    /// The name of the suite.
    pub name: String,

    /// The report for each test, in the order the tests completed.
    pub results: Vec<TestReport>,

    /// True if every test is ok. An empty suite is ok.
    pub ok: bool,
}

impl SuiteReport {
    /// Builds a suite report out of test reports.
    pub fn new(name: impl Into<String>, results: Vec<TestReport>) -> Self {
        let ok = results.iter().all(|result| result.ok);
        Self {
            name: name.into(),
            results,
            ok,
        }
    }
}

/// Statistics for a run, accumulated across suites.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunStats {
    /// The number of suites run.
    pub suites_run: usize,

    /// The number of suites that passed.
    pub suites_passed: usize,

    /// The number of suites that failed.
    pub suites_failed: usize,

    /// The number of tests run, including skipped tests.
    pub tests_run: usize,

    /// The number of tests that passed. Doesn't include skipped tests.
    pub tests_passed: usize,

    /// The number of tests that failed.
    pub tests_failed: usize,

    /// The number of tests skipped by the harness.
    pub tests_skipped: usize,

    /// The total number of assertions recorded.
    pub assertions: usize,
}

impl RunStats {
    /// Returns true if every suite run so far passed.
    pub fn is_success(&self) -> bool {
        self.suites_failed == 0
    }

    /// Adds a suite's results to these stats.
    pub fn on_suite(&mut self, suite: &SuiteReport) {
        self.suites_run += 1;
        if suite.ok {
            self.suites_passed += 1;
        } else {
            self.suites_failed += 1;
        }

        for test in &suite.results {
            self.tests_run += 1;
            self.assertions += test.assertions.len();
            if test.skipped {
                self.tests_skipped += 1;
            } else if test.ok {
                self.tests_passed += 1;
            } else {
                self.tests_failed += 1;
            }
        }
    }
}

/// The format reports are written in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MessageFormat {
    /// A human-readable trace: one line per test and assertion, then a line per suite.
    #[default]
    Human,

    /// One JSON-serialized [`SuiteReport`] per line.
    Json,
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    should_colorize: bool,
    use_unicode: bool,
    message_format: MessageFormat,
}

impl TestReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Set to true if the reporter should use Unicode markers (✓ and ✗) rather than ASCII ones.
    pub fn set_unicode(&mut self, use_unicode: bool) -> &mut Self {
        self.use_unicode = use_unicode;
        self
    }

    /// Sets the format reports are written in.
    pub fn set_message_format(&mut self, message_format: MessageFormat) -> &mut Self {
        self.message_format = message_format;
        self
    }

    /// Creates a new test reporter writing to `writer`.
    pub fn build(&self, writer: impl Write + Send + 'static) -> TestReporter {
        let mut styles = Box::<Styles>::default();
        if self.should_colorize {
            styles.colorize();
        }
        let mut theme = ThemeCharacters::default();
        if self.use_unicode {
            theme.use_unicode();
        }

        TestReporter {
            writer: DebugIgnore(Box::new(writer)),
            styles,
            theme,
            message_format: self.message_format,
        }
    }
}

/// Writes test and suite results as they come in.
#[derive(Debug)]
pub struct TestReporter {
    writer: DebugIgnore<Box<dyn Write + Send>>,
    styles: Box<Styles>,
    theme: ThemeCharacters,
    message_format: MessageFormat,
}

impl TestReporter {
    /// Reports a completed test, returning its report.
    pub fn report_test(&mut self, test: CompletedTest) -> io::Result<TestReport> {
        let report = TestReport::new(test);
        if self.message_format == MessageFormat::Human {
            self.write_test(&report)?;
        }
        Ok(report)
    }

    /// Reports a suite once all its tests have been reported, returning its report.
    pub fn report_suite(
        &mut self,
        name: &str,
        results: Vec<TestReport>,
    ) -> io::Result<SuiteReport> {
        let report = SuiteReport::new(name, results);
        match self.message_format {
            MessageFormat::Human => self.write_suite(&report)?,
            MessageFormat::Json => {
                serde_json::to_writer(&mut *self.writer, &report).map_err(io::Error::from)?;
                writeln!(self.writer)?;
            }
        }
        self.writer.flush()?;
        Ok(report)
    }

    /// Writes a summary of the whole run.
    ///
    /// Nothing is written in JSON mode.
    pub fn write_summary(&mut self, stats: &RunStats) -> io::Result<()> {
        if self.message_format == MessageFormat::Json {
            return Ok(());
        }

        let styles = &*self.styles;
        let summary_style = if stats.is_success() {
            styles.pass
        } else {
            styles.fail
        };
        write!(
            self.writer,
            "{}: {} {} run: {} passed, {} failed; ",
            "Summary".style(summary_style),
            stats.suites_run.style(styles.count),
            plural::suites_str(stats.suites_run),
            stats.suites_passed.style(styles.count),
            stats.suites_failed.style(styles.count),
        )?;
        write!(
            self.writer,
            "{} {} run: {} passed, {} failed",
            stats.tests_run.style(styles.count),
            plural::tests_str(stats.tests_run),
            stats.tests_passed.style(styles.count),
            stats.tests_failed.style(styles.count),
        )?;
        if stats.tests_skipped > 0 {
            write!(
                self.writer,
                ", {} skipped",
                stats.tests_skipped.style(styles.count)
            )?;
        }
        writeln!(
            self.writer,
            "; {} {}",
            stats.assertions.style(styles.count),
            plural::assertions_str(stats.assertions),
        )?;
        self.writer.flush()
    }

    // ---
    // Helper methods
    // ---

    fn write_test(&mut self, report: &TestReport) -> io::Result<()> {
        let styles = &*self.styles;
        if report.skipped {
            return writeln!(
                self.writer,
                "{} {} {}",
                self.theme.skip().style(styles.skip),
                report.name,
                "(skipped)".style(styles.skip),
            );
        }

        let (marker, style) = self.status(report.ok);
        writeln!(self.writer, "{} {}", marker.style(style), report.name)?;
        for assertion in &report.assertions {
            self.write_assertion(assertion)?;
        }
        Ok(())
    }

    fn write_assertion(&mut self, assertion: &AssertionOutcome) -> io::Result<()> {
        let styles = &*self.styles;
        let (marker, style) = self.status(assertion.ok);
        writeln!(
            self.writer,
            "    {} {}({})",
            marker.style(style),
            assertion.operator,
            assertion.name,
        )?;

        if !assertion.ok
            && let (Some(actual), Some(expected)) = (&assertion.actual, &assertion.expected)
        {
            writeln!(
                self.writer,
                "      {} actual: {}, expected: {}",
                "=>".style(styles.fail_output),
                actual,
                expected,
            )?;
        }

        if let Some(error) = &assertion.error {
            writeln!(
                self.writer,
                "      {} {}",
                "error:".style(styles.fail_output),
                error.message
            )?;
            for cause in &error.causes {
                writeln!(self.writer, "        caused by: {cause}")?;
            }
        }
        Ok(())
    }

    fn write_suite(&mut self, report: &SuiteReport) -> io::Result<()> {
        let styles = &*self.styles;
        let (marker, style) = self.status(report.ok);
        let test_count = report.results.len();
        write!(
            self.writer,
            "{} {} ({} {}",
            marker.style(style),
            report.name.style(styles.suite),
            test_count.style(styles.count),
            plural::tests_str(test_count),
        )?;
        let failed = report.results.iter().filter(|result| !result.ok).count();
        if failed > 0 {
            write!(self.writer, ", {} failed", failed.style(styles.fail))?;
        }
        writeln!(self.writer, ")")
    }

    fn status(&self, ok: bool) -> (&'static str, Style) {
        let style = if ok {
            self.styles.pass
        } else {
            self.styles.fail
        };
        (self.theme.status(ok), style)
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    fail_output: Style,
    skip: Style,
    suite: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.fail_output = Style::new().magenta();
        self.skip = Style::new().yellow().bold();
        self.suite = Style::new().blue().bold();
    }
}
