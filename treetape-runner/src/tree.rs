// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nested test definitions.
//!
//! A [`TestTree`] maps names to either tests, nested trees, or plain values. Trees keep their
//! insertion order, which is also the order tests are run in.

use crate::executor::{TestContext, TestFn, TestResult};
use indexmap::IndexMap;
use std::future::Future;

/// A node in a [`TestTree`].
#[derive(Clone, Debug)]
pub enum TreeNode {
    /// A test.
    Test(TestFn),

    /// A nested tree. Its tests are named after the path leading to them.
    Subtree(TestTree),

    /// Anything else, e.g. shared fixture data. Ignored when flattening.
    Value(serde_json::Value),
}

/// A tree of named tests.
///
/// # Examples
///
/// ```
/// use treetape_runner::tree::TestTree;
///
/// let tree = TestTree::new()
///     .test("test_add", |t| async move {
///         t.equal(1 + 1, 2, "adds");
///         t.done();
///         Ok(())
///     })
///     .subtree(
///         "nested",
///         TestTree::new().test("test_sub", |t| async move {
///             t.equal(2 - 1, 1, "subtracts");
///             t.done();
///             Ok(())
///         }),
///     );
/// assert_eq!(tree.test_count(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct TestTree {
    nodes: IndexMap<String, TreeNode>,
}

impl TestTree {
    /// Creates a new, empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a test to this tree.
    pub fn test<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        self.insert(name, TreeNode::Test(TestFn::new(f)));
        self
    }

    /// Adds a nested tree to this tree.
    pub fn subtree(mut self, name: impl Into<String>, tree: TestTree) -> Self {
        self.insert(name, TreeNode::Subtree(tree));
        self
    }

    /// Adds a value that isn't a test to this tree.
    pub fn value(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(name, TreeNode::Value(value.into()));
        self
    }

    /// Inserts a node, returning the node previously stored under the same name.
    ///
    /// A replaced node keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, node: TreeNode) -> Option<TreeNode> {
        self.nodes.insert(name.into(), node)
    }

    /// Returns the node stored under `name`.
    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        self.nodes.get(name)
    }

    /// Iterates over the direct children of this tree, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeNode)> + '_ {
        self.nodes.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// The number of direct children.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if this tree has no children.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The number of tests in this tree, including nested trees.
    pub fn test_count(&self) -> usize {
        self.nodes
            .values()
            .map(|node| match node {
                TreeNode::Test(_) => 1,
                TreeNode::Subtree(tree) => tree.test_count(),
                TreeNode::Value(_) => 0,
            })
            .sum()
    }
}

impl FromIterator<(String, TreeNode)> for TestTree {
    fn from_iter<I: IntoIterator<Item = (String, TreeNode)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insertion_order_is_preserved() {
        let tree = TestTree::new()
            .value("zeta", 1)
            .subtree("alpha", TestTree::new())
            .value("mid", json!({ "a": 1 }));
        let names: Vec<_> = tree.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn replacing_keeps_position() {
        let mut tree = TestTree::new().value("a", 1).value("b", 2);
        let previous = tree.insert("a", TreeNode::Value(json!(3)));
        assert!(matches!(previous, Some(TreeNode::Value(v)) if v == json!(1)));
        let names: Vec<_> = tree.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(tree.len(), 2);
    }
}
