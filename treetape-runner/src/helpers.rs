// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for treetape-runner.

/// Utilities for pluralizing various words based on count.
pub(crate) mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub(crate) fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "suite" if `count` is 1, otherwise "suites".
    pub(crate) fn suites_str(count: usize) -> &'static str {
        if count == 1 { "suite" } else { "suites" }
    }

    /// Returns "assertion" if `count` is 1, otherwise "assertions".
    pub(crate) fn assertions_str(count: usize) -> &'static str {
        if count == 1 {
            "assertion"
        } else {
            "assertions"
        }
    }
}

/// Markers printed in front of tests, assertions and suites.
///
/// Defaults to ASCII. [`use_unicode`](Self::use_unicode) switches to check marks.
#[derive(Clone, Debug)]
pub(crate) struct ThemeCharacters {
    pass: &'static str,
    fail: &'static str,
    skip: &'static str,
}

impl Default for ThemeCharacters {
    fn default() -> Self {
        Self {
            pass: "ok",
            fail: "FAIL",
            skip: "-",
        }
    }
}

impl ThemeCharacters {
    pub(crate) fn use_unicode(&mut self) {
        self.pass = "✓";
        self.fail = "✗";
    }

    pub(crate) fn skip(&self) -> &'static str {
        self.skip
    }

    /// Returns the pass or fail marker.
    pub(crate) fn status(&self, ok: bool) -> &'static str {
        if ok { self.pass } else { self.fail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes() {
        assert_eq!(plural::tests_str(0), "tests");
        assert_eq!(plural::tests_str(1), "test");
        assert_eq!(plural::suites_str(2), "suites");
        assert_eq!(plural::assertions_str(1), "assertion");
    }

    #[test]
    fn theme_characters() {
        let mut theme = ThemeCharacters::default();
        assert_eq!((theme.status(true), theme.status(false)), ("ok", "FAIL"));
        theme.use_unicode();
        assert_eq!(
            (theme.status(true), theme.status(false), theme.skip()),
            ("✓", "✗", "-")
        );
    }
}
