// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving file descriptors to test trees.

use crate::{errors::LoadSuiteError, tree::TestTree};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use std::{fmt, sync::Arc};

/// Identifies a test suite by path.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FileDescriptor {
    path: Utf8PathBuf,
}

impl FileDescriptor {
    /// Creates a new descriptor.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the suite.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The name of the suite: the path's file name with the last extension removed.
    ///
    /// A path without a file name (e.g. `..`) is used as-is.
    pub fn suite_name(&self) -> &str {
        self.path.file_stem().unwrap_or(self.path.as_str())
    }
}

impl fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Loads the test tree for a suite.
pub trait SuiteLoader: Send + Sync {
    /// Loads the test tree at `path`.
    fn load(&self, path: &Utf8Path) -> Result<TestTree, LoadSuiteError>;

    /// The suites to run if none are specified.
    fn default_suites(&self) -> Vec<FileDescriptor> {
        Vec::new()
    }
}

impl<L: SuiteLoader + ?Sized> SuiteLoader for Arc<L> {
    fn load(&self, path: &Utf8Path) -> Result<TestTree, LoadSuiteError> {
        (**self).load(path)
    }

    fn default_suites(&self) -> Vec<FileDescriptor> {
        (**self).default_suites()
    }
}

type TreeBuilder = Arc<dyn Fn() -> TestTree + Send + Sync>;

/// A [`SuiteLoader`] over suites registered in code.
///
/// Each suite is built fresh every time it is loaded. The default suites are all registered
/// suites, in registration order.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use treetape_runner::{loader::{SuiteLoader, SuiteRegistry}, tree::TestTree};
///
/// let registry = SuiteRegistry::new().register("tests/math.rs", || {
///     TestTree::new().test("test_add", |t| async move {
///         t.equal(2 + 2, 4, "adds");
///         t.done();
///         Ok(())
///     })
/// });
/// let tree = registry.load(Utf8Path::new("tests/math.rs")).unwrap();
/// assert_eq!(tree.test_count(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SuiteRegistry {
    suites: IndexMap<Utf8PathBuf, DebugIgnore<TreeBuilder>>,
}

impl SuiteRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a suite at `path`, replacing any suite already registered there.
    pub fn register<F>(mut self, path: impl Into<Utf8PathBuf>, build: F) -> Self
    where
        F: Fn() -> TestTree + Send + Sync + 'static,
    {
        self.suites.insert(path.into(), DebugIgnore(Arc::new(build)));
        self
    }

    /// The registered paths, in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &Utf8Path> + '_ {
        self.suites.keys().map(|path| path.as_path())
    }
}

impl SuiteLoader for SuiteRegistry {
    fn load(&self, path: &Utf8Path) -> Result<TestTree, LoadSuiteError> {
        match self.suites.get(path) {
            Some(build) => Ok((build.0)()),
            None => Err(LoadSuiteError::UnknownSuite {
                path: path.to_owned(),
                known: self.suites.keys().cloned().collect(),
            }),
        }
    }

    fn default_suites(&self) -> Vec<FileDescriptor> {
        self.paths().map(FileDescriptor::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("tests/math.rs", "math" ; "extension stripped")]
    #[test_case("tests/math.spec.rs", "math.spec" ; "only last extension")]
    #[test_case("math", "math" ; "no extension")]
    #[test_case(".hidden", ".hidden" ; "dotfile")]
    #[test_case("..", ".." ; "no file name")]
    fn suite_names(path: &str, name: &str) {
        assert_eq!(FileDescriptor::new(path).suite_name(), name);
    }

    #[test]
    fn registry_loads_and_lists_suites() {
        let registry = SuiteRegistry::new()
            .register("b.rs", || TestTree::new().value("x", 1))
            .register("a.rs", TestTree::new);

        assert_eq!(registry.load(Utf8Path::new("b.rs")).unwrap().len(), 1);
        assert!(registry.load(Utf8Path::new("a.rs")).unwrap().is_empty());
        assert_eq!(
            registry.default_suites(),
            vec![FileDescriptor::new("b.rs"), FileDescriptor::new("a.rs")]
        );
    }

    #[test]
    fn registry_rejects_unknown_suites() {
        let registry = SuiteRegistry::new().register("a.rs", TestTree::new);
        let error = registry.load(Utf8Path::new("c.rs")).unwrap_err();
        assert!(matches!(
            error,
            LoadSuiteError::UnknownSuite { ref path, ref known }
                if path.as_str() == "c.rs" && known == &[Utf8PathBuf::from("a.rs")]
        ));
    }
}
