// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for treetape.
//!
//! The basic flow of a run is:
//!
//! 1. A stream of [`FileDescriptor`](loader::FileDescriptor)s is fed into a
//!    [`TreeRunner`](runner::TreeRunner).
//! 2. Each descriptor is resolved to a [`TestTree`](tree::TestTree) by a
//!    [`SuiteLoader`](loader::SuiteLoader).
//! 3. The tree is [flattened](flatten::flatten) into a list of tests with slash-separated names.
//! 4. Every test is registered with a [`Harness`](harness::Harness), which runs them and produces a
//!    flat feed of [`HarnessEvent`](harness::HarnessEvent)s.
//! 5. The [`EventReducer`](reducer::EventReducer) turns the feed back into one
//!    [`CompletedTest`](reducer::CompletedTest) per test.
//! 6. The [`TestReporter`](reporter::TestReporter) prints each result and builds a
//!    [`SuiteReport`](reporter::SuiteReport).

pub mod config;
pub mod errors;
pub mod executor;
pub mod flatten;
pub mod harness;
mod helpers;
pub mod loader;
pub mod reducer;
pub mod reporter;
pub mod runner;
pub mod tree;
