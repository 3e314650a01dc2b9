// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for treetape failures.
///
/// treetape runs may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum TreeTapeExitCode {}

impl TreeTapeExitCode {
    /// No errors occurred and treetape exited normally.
    pub const OK: i32 = 0;

    /// A suite had one or more failing tests.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// A suite could not be loaded.
    pub const SUITE_LOAD_FAILED: i32 = 104;

    /// A harness produced events that don't form a valid sequence of tests.
    pub const PROTOCOL_VIOLATION: i32 = 105;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a treetape invocation.
    pub const SETUP_ERROR: i32 = 96;
}
