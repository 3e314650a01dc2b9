// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    exit_codes::TreeTapeExitCode,
    output::{NO_HEADING_TARGET, StderrStyles},
};
use owo_colors::OwoColorize;
use std::{error::Error, io};
use thiserror::Error;
use tracing::error;
use treetape_runner::errors::{ConfigParseError, LoadSuiteError, ProtocolViolation, RunError};

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected failure: either a problem with the invocation or test failures.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed {
        #[source]
        err: io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to build tokio runtime")]
    RuntimeBuildFailed {
        #[source]
        err: io::Error,
    },
    #[error("suite load error")]
    LoadSuiteError {
        #[from]
        err: LoadSuiteError,
    },
    #[error("harness protocol violation")]
    ProtocolViolation {
        suite: String,
        #[source]
        err: ProtocolViolation,
    },
    #[error("error writing report")]
    WriteReportError {
        #[source]
        err: io::Error,
    },
    #[error("test run failed")]
    TestRunFailed { suite: String },
}

impl ExpectedError {
    pub(crate) fn current_dir_failed(err: io::Error) -> Self {
        Self::CurrentDirFailed { err }
    }

    pub(crate) fn current_dir_invalid_utf8(path: std::path::PathBuf) -> Self {
        Self::CurrentDirInvalidUtf8 { path }
    }

    pub(crate) fn runtime_build_failed(err: io::Error) -> Self {
        Self::RuntimeBuildFailed { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::RuntimeBuildFailed { .. } => TreeTapeExitCode::SETUP_ERROR,
            Self::LoadSuiteError { .. } => TreeTapeExitCode::SUITE_LOAD_FAILED,
            Self::ProtocolViolation { .. } => TreeTapeExitCode::PROTOCOL_VIOLATION,
            Self::WriteReportError { .. } => TreeTapeExitCode::WRITE_OUTPUT_ERROR,
            Self::TestRunFailed { .. } => TreeTapeExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::RuntimeBuildFailed { err } => {
                error!("failed to build tokio runtime");
                Some(err as &dyn Error)
            }
            Self::LoadSuiteError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ProtocolViolation { suite, err } => {
                error!(
                    "harness protocol violation in suite `{}`",
                    suite.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::WriteReportError { err } => {
                error!("failed to write test report");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed { suite } => {
                error!(
                    "test run failed: first failing suite was `{}`",
                    suite.style(styles.bold)
                );
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

impl From<RunError> for ExpectedError {
    fn from(error: RunError) -> Self {
        match error {
            RunError::LoadSuite(err) => Self::LoadSuiteError { err },
            RunError::Protocol { suite, source } => Self::ProtocolViolation { suite, err: source },
            RunError::WriteReport(err) => Self::WriteReportError { err },
            RunError::SuiteFailed { name } => Self::TestRunFailed { suite: name },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_errors_map_to_exit_codes() {
        let cases = [
            (
                RunError::SuiteFailed {
                    name: "b".to_owned(),
                },
                TreeTapeExitCode::TEST_RUN_FAILED,
            ),
            (
                RunError::LoadSuite(LoadSuiteError::UnknownSuite {
                    path: "missing.rs".into(),
                    known: vec![],
                }),
                TreeTapeExitCode::SUITE_LOAD_FAILED,
            ),
            (
                RunError::Protocol {
                    suite: "a".to_owned(),
                    source: ProtocolViolation::UnterminatedTest {
                        name: "a/test".to_owned(),
                    },
                },
                TreeTapeExitCode::PROTOCOL_VIOLATION,
            ),
            (
                RunError::WriteReport(io::Error::from(io::ErrorKind::BrokenPipe)),
                TreeTapeExitCode::WRITE_OUTPUT_ERROR,
            ),
        ];

        for (error, code) in cases {
            let description = error.to_string();
            assert_eq!(
                ExpectedError::from(error).process_exit_code(),
                code,
                "exit code for {description}"
            );
        }
    }
}
