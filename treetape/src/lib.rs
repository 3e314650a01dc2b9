// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Command-line front end for treetape.
//!
//! Test binaries that set `harness = false` hand their suites to [`harness_main`]:
//!
//! ```no_run
//! use treetape_runner::{loader::SuiteRegistry, tree::TestTree};
//!
//! fn main() -> color_eyre::Result<()> {
//!     treetape::harness_main(SuiteRegistry::new().register("suites/math.rs", || {
//!         TestTree::new().test("test_add", |t| async move {
//!             t.equal(1 + 1, 2, "adds");
//!             t.done();
//!             Ok(())
//!         })
//!     }))
//! }
//! ```
//!
//! For documentation about the command line, run the test binary with `--help`.

mod dispatch;
mod errors;
mod exit_codes;
mod output;

pub use dispatch::TreeTapeApp;
#[doc(hidden)]
pub use errors::ExpectedError;
pub(crate) use errors::Result;
pub use exit_codes::TreeTapeExitCode;
pub use output::{Color, OutputContext, StderrStyles};

use clap::Parser;
use treetape_runner::loader::SuiteLoader;

/// Parses the command line, runs the suites in `loader` and exits the process.
///
/// The exit code is one of the [`TreeTapeExitCode`] values.
pub fn harness_main<L: SuiteLoader>(loader: L) -> color_eyre::Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let app = TreeTapeApp::parse();
    let output = app.init_output();

    match app.exec(loader, output) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
