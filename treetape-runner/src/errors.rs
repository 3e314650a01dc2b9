// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by treetape.

use crate::harness::{AssertionOutcome, TestId};
use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use std::{error, fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse treetape config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error that occurs while parsing a `key=value` harness option.
#[derive(Clone, Debug, Error)]
#[error("invalid harness option `{input}`: {reason}")]
pub struct HarnessOptionParseError {
    input: String,
    reason: &'static str,
}

impl HarnessOptionParseError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// An error that occurs while resolving a file descriptor to a test tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadSuiteError {
    /// No suite is known at this path.
    #[error(
        "no suite registered at `{path}` (known suites: {})",
        display_known(.known)
    )]
    UnknownSuite {
        /// The path that was requested.
        path: Utf8PathBuf,

        /// The paths the loader knows about.
        known: Vec<Utf8PathBuf>,
    },

    /// The loader found the suite but failed to build it.
    #[error("error loading suite at `{path}`")]
    Load {
        /// The path that was requested.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: Box<dyn error::Error + Send + Sync>,
    },
}

fn display_known(known: &[Utf8PathBuf]) -> String {
    if known.is_empty() {
        "(none)".to_owned()
    } else {
        known
            .iter()
            .map(|path| path.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// An event arrived from the harness that the reducer's state does not allow.
///
/// Produced by [`EventReducer`](crate::reducer::EventReducer). Each of these indicates either a
/// harness bug or a test that leaked work across test boundaries, so they are never recovered
/// from.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ProtocolViolation {
    /// An assertion was recorded while no test was running: either before the first test started
    /// or after the previous one ended.
    #[error(
        "assertion `{}({})` from test {test_id} recorded while no test was running",
        .assertion.operator,
        .assertion.name
    )]
    AssertionWithoutTest {
        /// The test the harness attributed the assertion to.
        test_id: TestId,

        /// The assertion.
        assertion: Box<AssertionOutcome>,
    },

    /// A test ended while no test was running, e.g. a second end for the same test.
    #[error("test {test_id} ended while no test was running")]
    EndWithoutTest {
        /// The test the end was attributed to.
        test_id: TestId,
    },

    /// A test started while another one was still running.
    #[error("test `{started}` started while test `{running}` was still running")]
    OverlappingTest {
        /// The name of the test that is still running.
        running: String,

        /// The name of the test that tried to start.
        started: String,
    },

    /// An assertion or end arrived for a test other than the one running.
    #[error("{kind} for test {event_test} arrived while test `{running}` ({running_test}) was running")]
    ForeignEvent {
        /// The kind of event: "assertion" or "end".
        kind: &'static str,

        /// The test the event belongs to.
        event_test: TestId,

        /// The test that is currently running.
        running_test: TestId,

        /// The name of the test that is currently running.
        running: String,
    },

    /// The event feed finished while a test was still running.
    #[error("event feed ended while test `{name}` was still running")]
    UnterminatedTest {
        /// The name of the test that never ended.
        name: String,
    },
}

/// An error that occurs while running suites.
#[derive(Debug, Error)]
pub enum RunError {
    /// A suite could not be loaded.
    #[error("error loading suite")]
    LoadSuite(#[from] LoadSuiteError),

    /// The harness event feed for a suite violated the test protocol.
    #[error("harness protocol violation in suite `{suite}`")]
    Protocol {
        /// The suite being run.
        suite: String,

        /// The violation.
        #[source]
        source: ProtocolViolation,
    },

    /// Writing the report failed.
    #[error("error writing test report")]
    WriteReport(#[source] io::Error),

    /// A suite had failing tests. Further suites were not run.
    #[error("test failures occurred in suite `{name}`")]
    SuiteFailed {
        /// The name of the failing suite.
        name: String,
    },
}

/// Displays an error along with its chain of sources, one per line.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(err) = source {
            write!(f, "\n  caused by: {err}")?;
            source = err.source();
        }

        Ok(())
    }
}
