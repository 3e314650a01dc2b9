// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reduces a harness's flat event feed into one result per test.
//!
//! The harness reports tests as a flat sequence of `Test`, `Assert` and `End` events. The
//! [`EventReducer`] reconstructs which test is running from that sequence, and collects each
//! test's assertions into a [`CompletedTest`].
//!
//! The reducer holds at most one open test at a time, so it relies on the harness never
//! interleaving the events of two tests. A harness that runs tests in parallel would need the
//! reducer to track open tests keyed by [`TestId`] instead.

use crate::{
    errors::ProtocolViolation,
    harness::{AssertionOutcome, HarnessEvent, TestId, TestStart},
};
use futures::Stream;
use pin_project_lite::pin_project;
use std::{
    pin::Pin,
    task::{Context, Poll, ready},
};
use tracing::{debug, trace};

/// The result of a single test, materialized once the test has ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompletedTest {
    /// The identifier the harness assigned to the test.
    pub id: TestId,

    /// The name of the test.
    pub name: String,

    /// True if the harness skipped the test.
    pub skip: bool,

    /// The assertions recorded during the test, in the order they were received.
    pub assertions: Vec<AssertionOutcome>,
}

impl CompletedTest {
    fn open(start: TestStart) -> Self {
        Self {
            id: start.id,
            name: start.name,
            skip: start.skip,
            assertions: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
enum ReducerState {
    #[default]
    Idle,
    Open(CompletedTest),
}

/// A state machine that turns harness events into [`CompletedTest`]s.
///
/// The reducer is either idle or has exactly one open test. Any event that doesn't fit the
/// current state is a [`ProtocolViolation`].
#[derive(Debug, Default)]
pub struct EventReducer {
    state: ReducerState,
}

impl EventReducer {
    /// Creates a new, idle reducer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no test is open.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ReducerState::Idle)
    }

    /// Handles a single event, returning the test it completed, if any.
    ///
    /// After an error, the reducer's state is unspecified and it should no longer be used.
    pub fn handle(
        &mut self,
        event: HarnessEvent,
    ) -> Result<Option<CompletedTest>, ProtocolViolation> {
        match (std::mem::take(&mut self.state), event) {
            (ReducerState::Idle, HarnessEvent::Test(start)) => {
                trace!(test = %start.name, id = %start.id, "test started");
                self.state = ReducerState::Open(CompletedTest::open(start));
                Ok(None)
            }
            (ReducerState::Idle, HarnessEvent::Assert { test_id, outcome }) => {
                Err(ProtocolViolation::AssertionWithoutTest {
                    test_id,
                    assertion: Box::new(outcome),
                })
            }
            (ReducerState::Idle, HarnessEvent::End { test_id }) => {
                Err(ProtocolViolation::EndWithoutTest { test_id })
            }
            (ReducerState::Open(current), HarnessEvent::Test(start)) => {
                Err(ProtocolViolation::OverlappingTest {
                    running: current.name,
                    started: start.name,
                })
            }
            (ReducerState::Open(mut current), HarnessEvent::Assert { test_id, outcome }) => {
                if test_id != current.id {
                    return Err(foreign_event("assertion", test_id, current));
                }
                current.assertions.push(outcome);
                self.state = ReducerState::Open(current);
                Ok(None)
            }
            (ReducerState::Open(current), HarnessEvent::End { test_id }) => {
                if test_id != current.id {
                    return Err(foreign_event("end", test_id, current));
                }
                trace!(
                    test = %current.name,
                    assertions = current.assertions.len(),
                    "test ended",
                );
                Ok(Some(current))
            }
        }
    }

    /// Finishes reduction once the event feed has ended.
    ///
    /// Returns an error if a test was still open.
    pub fn finish(self) -> Result<(), ProtocolViolation> {
        match self.state {
            ReducerState::Idle => Ok(()),
            ReducerState::Open(current) => Err(ProtocolViolation::UnterminatedTest {
                name: current.name,
            }),
        }
    }
}

fn foreign_event(
    kind: &'static str,
    event_test: TestId,
    current: CompletedTest,
) -> ProtocolViolation {
    ProtocolViolation::ForeignEvent {
        kind,
        event_test,
        running_test: current.id,
        running: current.name,
    }
}

pin_project! {
    /// A stream adapter that reduces harness events into [`CompletedTest`]s.
    ///
    /// Created by [`ReduceEvents::new`]. The stream ends after the first [`ProtocolViolation`].
    #[must_use = "streams do nothing unless polled"]
    pub struct ReduceEvents<S> {
        #[pin]
        events: S,
        reducer: Option<EventReducer>,
    }
}

impl<S> ReduceEvents<S>
where
    S: Stream<Item = HarnessEvent>,
{
    /// Creates a new `ReduceEvents` around a stream of harness events.
    pub fn new(events: S) -> Self {
        Self {
            events,
            reducer: Some(EventReducer::new()),
        }
    }
}

impl<S> Stream for ReduceEvents<S>
where
    S: Stream<Item = HarnessEvent>,
{
    type Item = Result<CompletedTest, ProtocolViolation>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            let Some(reducer) = this.reducer.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(this.events.as_mut().poll_next(cx)) {
                Some(event) => match reducer.handle(event) {
                    Ok(Some(completed)) => return Poll::Ready(Some(Ok(completed))),
                    Ok(None) => {}
                    Err(violation) => {
                        debug!(%violation, "harness protocol violation");
                        *this.reducer = None;
                        return Poll::Ready(Some(Err(violation)));
                    }
                },
                None => {
                    let reducer = this.reducer.take().unwrap_or_default();
                    return match reducer.finish() {
                        Ok(()) => Poll::Ready(None),
                        Err(violation) => {
                            debug!(%violation, "harness protocol violation");
                            Poll::Ready(Some(Err(violation)))
                        }
                    };
                }
            }
        }
    }
}
