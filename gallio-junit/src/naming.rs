// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File names for split suites.
//!
//! By default a suite named `Foo.Bar` is written to `TEST-Foo.Bar.xml`, with the name used
//! verbatim. Verbatim names are not checked: two suites with the same name map to the same
//! file (the later suite wins), and a name containing path separators or characters the
//! filesystem rejects either escapes the output directory or fails with an I/O error.
//! [`SuiteFileNamer::sanitized`] opts into replacing such characters.

/// The default file name prefix.
pub const DEFAULT_PREFIX: &str = "TEST-";

/// The default file name suffix.
pub const DEFAULT_SUFFIX: &str = ".xml";

const REPLACEMENT: char = '_';

/// Derives output file names from suite names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuiteFileNamer {
    prefix: String,
    suffix: String,
    sanitize: bool,
}

impl Default for SuiteFileNamer {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_SUFFIX)
    }
}

impl SuiteFileNamer {
    /// Creates a namer that uses suite names verbatim.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            sanitize: false,
        }
    }

    /// Sets whether suite names are sanitized before use.
    ///
    /// Sanitizing replaces path separators, characters reserved on Windows and control characters
    /// with `_`. Different suite names may then map to the same file.
    pub fn sanitized(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Returns the prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the suffix.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns true if suite names are sanitized.
    pub fn is_sanitized(&self) -> bool {
        self.sanitize
    }

    /// Returns the file name for a suite.
    pub fn file_name(&self, suite_name: &str) -> String {
        let mut file_name =
            String::with_capacity(self.prefix.len() + suite_name.len() + self.suffix.len());
        file_name.push_str(&self.prefix);
        if self.sanitize {
            file_name.extend(suite_name.chars().map(|c| {
                if is_unsafe(c) { REPLACEMENT } else { c }
            }));
        } else {
            file_name.push_str(suite_name);
        }
        file_name.push_str(&self.suffix);
        file_name
    }
}

fn is_unsafe(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Foo.Bar", "TEST-Foo.Bar.xml" ; "dotted")]
    #[test_case("", "TEST-.xml" ; "empty")]
    #[test_case("a/b", "TEST-a/b.xml" ; "separator kept")]
    #[test_case("Größe Tests", "TEST-Größe Tests.xml" ; "unicode and spaces")]
    fn verbatim_names(suite_name: &str, expected: &str) {
        assert_eq!(SuiteFileNamer::default().file_name(suite_name), expected);
    }

    #[test_case("a/b", "TEST-a_b.xml" ; "forward slash")]
    #[test_case(r"a\b", "TEST-a_b.xml" ; "backslash")]
    #[test_case("Fixture<int>", "TEST-Fixture_int_.xml" ; "generic brackets")]
    #[test_case("What?: \"yes\"|*", "TEST-What__ _yes___.xml" ; "reserved characters")]
    #[test_case("tab\tline\n", "TEST-tab_line_.xml" ; "control characters")]
    #[test_case("Foo.Bar", "TEST-Foo.Bar.xml" ; "safe name unchanged")]
    fn sanitized_names(suite_name: &str, expected: &str) {
        let namer = SuiteFileNamer::default().sanitized(true);
        assert_eq!(namer.file_name(suite_name), expected);
    }

    #[test]
    fn custom_prefix_and_suffix() {
        let namer = SuiteFileNamer::new("junit-", ".report.xml");
        assert_eq!(namer.file_name("Suite"), "junit-Suite.report.xml");
        assert_eq!(namer.prefix(), "junit-");
        assert_eq!(namer.suffix(), ".report.xml");
        assert!(!namer.is_sanitized());
    }
}
