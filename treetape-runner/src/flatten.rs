// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flattening of nested test trees into a list of runnable tests.

use crate::{
    config::RunConfig,
    executor::TestExec,
    harness::HarnessOptions,
    tree::{TestTree, TreeNode},
};
use std::sync::Arc;
use tracing::trace;

/// The prefix a test's own name must start with to be run when `test-only` is set.
pub const TEST_ONLY_PREFIX: &str = "test";

/// The tests of a single suite, in the order they will be registered with the harness.
#[derive(Clone, Debug)]
pub struct FlatSuite {
    /// The name of the suite. Also the prefix of every test name.
    pub name: String,

    /// The tests in this suite.
    pub tests: Vec<TestDescriptor>,
}

/// A single test, ready to be registered with a harness.
#[derive(Clone, Debug)]
pub struct TestDescriptor {
    /// The full name of the test: the suite name and every tree key leading to the test, joined
    /// with `/`.
    ///
    /// Names are not deduplicated: a tree key containing `/` can produce the same name as a
    /// nested tree.
    pub name: String,

    /// Options for the harness, shared by every test in the suite.
    pub options: Arc<HarnessOptions>,

    /// The wrapped test body.
    pub exec: TestExec,
}

/// Flattens a tree into a list of tests named `{prefix}/{key}/...`.
///
/// Tests appear depth-first, in tree order. Nodes that are neither tests nor trees are skipped,
/// and so are tests whose key doesn't start with [`TEST_ONLY_PREFIX`] if
/// [`test_only`](RunConfig::test_only) is set.
pub fn flatten(tree: &TestTree, config: &RunConfig, prefix: &str) -> FlatSuite {
    let options = Arc::new(config.harness_options().clone());
    let mut tests = Vec::new();
    flatten_into(tree, config.test_only(), &options, prefix, &mut tests);
    FlatSuite {
        name: prefix.to_owned(),
        tests,
    }
}

fn flatten_into(
    tree: &TestTree,
    test_only: bool,
    options: &Arc<HarnessOptions>,
    prefix: &str,
    out: &mut Vec<TestDescriptor>,
) {
    for (key, node) in tree.iter() {
        let name = format!("{prefix}/{key}");
        match node {
            TreeNode::Test(f) => {
                if test_only && !key.starts_with(TEST_ONLY_PREFIX) {
                    trace!(test = %name, "skipping non-test entry");
                    continue;
                }
                out.push(TestDescriptor {
                    exec: TestExec::new(name.clone(), f.clone()),
                    name,
                    options: options.clone(),
                });
            }
            TreeNode::Subtree(subtree) => {
                flatten_into(subtree, test_only, options, &name, out);
            }
            TreeNode::Value(_) => {
                trace!(entry = %name, "ignoring value entry");
            }
        }
    }
}
