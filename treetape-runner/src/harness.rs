// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interface between treetape and an assertion harness.
//!
//! A harness is the component that actually executes tests and records their assertions. treetape
//! doesn't care how it does that: it registers tests through a [`TestRegistrar`] and consumes the
//! resulting flat feed of [`HarnessEvent`]s. The only ordering requirement is that the events for
//! a test are contiguous and arrive as `Test`, then any number of `Assert`, then `End`.
//!
//! [`TapeHarness`] is the built-in implementation.

mod events;
mod tape;

pub use events::*;
pub use tape::*;

use crate::executor::TestExec;
use futures::stream::BoxStream;
use std::{fmt, sync::Arc};

/// Options passed through to the harness for every test in a suite.
///
/// treetape never looks inside these: they are forwarded exactly as configured.
pub type HarnessOptions = serde_json::Map<String, serde_json::Value>;

/// The harness's view of a single running test.
///
/// [`TestExec`] wraps this in a [`TestContext`](crate::executor::TestContext) before handing it
/// to the test body.
pub trait HarnessContext: Send + Sync + fmt::Debug {
    /// The identifier the harness assigned to this test.
    fn test_id(&self) -> TestId;

    /// The name the test was registered with.
    fn name(&self) -> &str;

    /// Records an assertion against this test.
    ///
    /// The harness assigns the assertion's [`id`](AssertionOutcome::id).
    fn record(&self, outcome: AssertionOutcome);

    /// Signals that the test has finished.
    fn end(&self);

    /// The number of assertions recorded so far.
    fn assert_count(&self) -> usize;
}

/// An assertion harness.
pub trait Harness: Send + Sync {
    /// Starts a new, empty session for a suite.
    ///
    /// Tests registered through the session's registrar are run by the harness, and their events
    /// show up on the session's event stream. The event stream ends once the registrar has been
    /// dropped and every registered test has ended.
    fn start_suite(&self, suite_name: &str) -> HarnessSession;
}

/// Accepts tests for a harness session.
pub trait TestRegistrar: Send {
    /// Registers a test with the harness.
    ///
    /// Registration does not wait for the test to run.
    fn register(&mut self, name: String, options: Arc<HarnessOptions>, exec: TestExec);
}

/// A harness session for a single suite, returned by [`Harness::start_suite`].
pub struct HarnessSession {
    /// Registers tests with this session. Drop it to close registration.
    pub registrar: Box<dyn TestRegistrar>,

    /// The events produced by the session.
    pub events: BoxStream<'static, HarnessEvent>,
}

impl fmt::Debug for HarnessSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessSession").finish_non_exhaustive()
    }
}
