// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The built-in harness, modeled after tape.
//!
//! Tests run one at a time, in registration order, on a tokio task. A test is considered running
//! from its `Test` event until it calls `end`; only then does the next test start.

use super::{
    AssertionOutcome, Harness, HarnessContext, HarnessEvent, HarnessOptions, HarnessSession,
    TestId, TestRegistrar, TestStart,
};
use crate::executor::TestExec;
use futures::StreamExt;
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::{
    mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    oneshot,
};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace, warn};

/// The built-in tape-style harness.
///
/// Understands two options, both per test:
///
/// * `skip` (bool): the test is reported as skipped and its body never runs.
/// * `timeout` (milliseconds): if the test hasn't ended in time, a failing assertion is recorded,
///   the test is ended and its body is cancelled.
///
/// If every handle to a test's context is dropped before the test ends, a failing assertion is
/// recorded and the test is ended on its behalf.
///
/// [`Harness::start_suite`] spawns a task, so it must be called from within a tokio runtime.
#[derive(Clone, Debug, Default)]
pub struct TapeHarness {
    _private: (),
}

impl TapeHarness {
    /// Creates a new tape harness.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Harness for TapeHarness {
    fn start_suite(&self, suite_name: &str) -> HarnessSession {
        let (registration_tx, registration_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();

        tokio::spawn(run_session(suite_name.to_owned(), registration_rx, event_tx));

        HarnessSession {
            registrar: Box::new(TapeRegistrar {
                sender: registration_tx,
            }),
            events: UnboundedReceiverStream::new(event_rx).boxed(),
        }
    }
}

#[derive(Debug)]
struct Registration {
    name: String,
    options: Arc<HarnessOptions>,
    exec: TestExec,
}

#[derive(Debug)]
struct TapeRegistrar {
    sender: UnboundedSender<Registration>,
}

impl TestRegistrar for TapeRegistrar {
    fn register(&mut self, name: String, options: Arc<HarnessOptions>, exec: TestExec) {
        if self
            .sender
            .send(Registration {
                name,
                options,
                exec,
            })
            .is_err()
        {
            // The session task only exits once all registrars are gone, so this can't happen.
            debug!("tape session closed before registration finished");
        }
    }
}

async fn run_session(
    suite_name: String,
    mut registration_rx: UnboundedReceiver<Registration>,
    event_tx: UnboundedSender<HarnessEvent>,
) {
    let mut next_id = 0;
    while let Some(registration) = registration_rx.recv().await {
        let id = TestId(next_id);
        next_id += 1;
        run_test(id, registration, &event_tx).await;
    }
    debug!(suite = %suite_name, tests = next_id, "tape session finished");
}

async fn run_test(
    id: TestId,
    registration: Registration,
    event_tx: &UnboundedSender<HarnessEvent>,
) {
    let Registration {
        name,
        options,
        exec,
    } = registration;
    let options = TapeOptions::new(&name, &options);

    trace!(test = %name, %id, "starting test");
    let start = HarnessEvent::Test(TestStart {
        id,
        name: name.clone(),
        skip: options.skip,
    });
    if event_tx.send(start).is_err() {
        debug!(test = %name, "event receiver dropped, not running test");
        return;
    }

    let state = Arc::new(TestState {
        id,
        name,
        event_tx: event_tx.clone(),
        assert_count: AtomicUsize::new(0),
        ended: AtomicBool::new(false),
    });

    if options.skip {
        state.end();
        return;
    }

    let (ended_tx, ended_rx) = oneshot::channel();
    let context = TapeContext {
        state: state.clone(),
        ended_tx: Mutex::new(Some(ended_tx)),
    };
    let handle = tokio::spawn(exec.run(Arc::new(context)));

    let ended = match options.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, ended_rx).await {
            Ok(res) => res,
            Err(_) => {
                warn!(test = %state.name, ?timeout, "test timed out");
                state.record(AssertionOutcome::new(
                    false,
                    "fail",
                    format!("test timed out after {}ms", timeout.as_millis()),
                ));
                state.end();
                handle.abort();
                return;
            }
        },
        None => ended_rx.await,
    };

    if ended.is_err() && !state.is_ended() {
        // All context handles were dropped without an end.
        debug!(test = %state.name, "test exited without ending");
        state.record(AssertionOutcome::new(false, "fail", "test exited without ending"));
        state.end();
    }
}

#[derive(Debug)]
struct TapeOptions {
    skip: bool,
    timeout: Option<Duration>,
}

impl TapeOptions {
    fn new(test_name: &str, options: &HarnessOptions) -> Self {
        let skip = match options.get("skip") {
            None => false,
            Some(value) => value.as_bool().unwrap_or_else(|| {
                warn!(test = test_name, %value, "ignoring non-boolean `skip` option");
                false
            }),
        };
        let timeout = match options.get("timeout") {
            None => None,
            Some(value) => match value.as_u64() {
                Some(millis) => Some(Duration::from_millis(millis)),
                None => {
                    warn!(test = test_name, %value, "ignoring non-integer `timeout` option");
                    None
                }
            },
        };
        Self { skip, timeout }
    }
}

/// State shared between the session task and a running test.
#[derive(Debug)]
struct TestState {
    id: TestId,
    name: String,
    event_tx: UnboundedSender<HarnessEvent>,
    assert_count: AtomicUsize,
    ended: AtomicBool,
}

impl TestState {
    fn record(&self, mut outcome: AssertionOutcome) {
        outcome.id = self.assert_count.fetch_add(1, Ordering::SeqCst);
        // Assertions after the end are still forwarded: it's up to the consumer to reject them.
        let _ = self.event_tx.send(HarnessEvent::Assert {
            test_id: self.id,
            outcome,
        });
    }

    fn end(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            debug!(test = %self.name, "test ended more than once");
        }
        let _ = self.event_tx.send(HarnessEvent::End { test_id: self.id });
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

/// The context handed to a running test.
///
/// The session task waits on `ended_tx`: it fires on the first end, and is dropped along with the
/// last handle to the context.
#[derive(Debug)]
struct TapeContext {
    state: Arc<TestState>,
    ended_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl HarnessContext for TapeContext {
    fn test_id(&self) -> TestId {
        self.state.id
    }

    fn name(&self) -> &str {
        &self.state.name
    }

    fn record(&self, outcome: AssertionOutcome) {
        self.state.record(outcome);
    }

    fn end(&self) {
        self.state.end();
        let sender = self
            .ended_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    fn assert_count(&self) -> usize {
        self.state.assert_count.load(Ordering::SeqCst)
    }
}
