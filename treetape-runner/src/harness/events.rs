// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Serialize;
use std::{error, fmt};

/// An identifier assigned by a harness to each test it runs, unique within a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct TestId(pub usize);

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An event produced by a harness.
///
/// For a single test, events are produced in the order `Test`, `Assert`*, `End`.
#[derive(Clone, Debug, PartialEq)]
pub enum HarnessEvent {
    /// A test started.
    Test(TestStart),

    /// An assertion was recorded.
    Assert {
        /// The test the assertion was recorded against.
        test_id: TestId,

        /// The assertion.
        outcome: AssertionOutcome,
    },

    /// A test ended.
    End {
        /// The test that ended.
        test_id: TestId,
    },
}

impl HarnessEvent {
    /// The test this event belongs to.
    pub fn test_id(&self) -> TestId {
        match self {
            HarnessEvent::Test(start) => start.id,
            HarnessEvent::Assert { test_id, .. } | HarnessEvent::End { test_id } => *test_id,
        }
    }
}

/// Data carried by [`HarnessEvent::Test`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestStart {
    /// The identifier the harness assigned to the test.
    pub id: TestId,

    /// The name the test was registered with.
    pub name: String,

    /// True if the harness skipped the test instead of running it.
    pub skip: bool,
}

/// The outcome of a single assertion.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssertionOutcome {
    /// The index of this assertion within its test, assigned by the harness.
    pub id: usize,

    /// Whether the assertion passed.
    pub ok: bool,

    /// The assertion primitive that produced this outcome, e.g. `equal`.
    pub operator: String,

    /// The message the assertion was made with.
    pub name: String,

    /// The actual value, if the primitive compares values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    /// The expected value, if the primitive compares values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// The error attached to the assertion, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AssertionError>,
}

impl AssertionOutcome {
    /// Creates a new outcome with no values or error attached.
    ///
    /// The id is assigned by the harness when the outcome is recorded.
    pub fn new(ok: bool, operator: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            ok,
            operator: operator.into(),
            name: name.into(),
            actual: None,
            expected: None,
            error: None,
        }
    }

    /// Attaches actual and expected values.
    pub fn with_values(mut self, actual: impl Into<String>, expected: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self.expected = Some(expected.into());
        self
    }

    /// Attaches an error.
    pub fn with_error(mut self, error: AssertionError) -> Self {
        self.error = Some(error);
        self
    }
}

/// An error captured along with an assertion, including its chain of causes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AssertionError {
    /// The top-level error message.
    pub message: String,

    /// Messages of the error's sources, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl AssertionError {
    /// Captures an error and its sources.
    pub fn from_error(error: &(dyn error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(err) = source {
            causes.push(err.to_string());
            source = err.source();
        }
        Self {
            message: error.to_string(),
            causes,
        }
    }

    /// Creates an error from a bare message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for cause in &self.causes {
            write!(f, "\n  caused by: {cause}")?;
        }
        Ok(())
    }
}
