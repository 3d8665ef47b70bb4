// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run-wide configuration.
//!
//! A [`RunEnvironment`] is created by a [`RunEnvironmentBuilder`] and is
//! immutable for the duration of a run. Filter patterns are compiled at build
//! time so that a malformed pattern fails before any test executes.

use crate::errors::{ConcurrencyModeParseError, EnvironmentBuildError};
use regex::Regex;
use serde::{ser::SerializeStruct, Serialize, Serializer};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// How selected tests are routed to the two worker pools.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConcurrencyMode {
    /// Route every test to the parallel pool, ignoring per-test flags.
    All,

    /// Route every test to the sequential pool.
    None,

    /// Route each test by its own thread-safety flag.
    ///
    /// This is the default.
    #[default]
    Auto,
}

impl ConcurrencyMode {
    /// Returns the canonical string token for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            ConcurrencyMode::All => "all",
            ConcurrencyMode::None => "none",
            ConcurrencyMode::Auto => "auto",
        }
    }

    /// Returns the list of known mode tokens.
    pub fn variants() -> [&'static str; 3] {
        ["all", "none", "auto"]
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConcurrencyMode {
    type Err = ConcurrencyModeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "all" => Ok(ConcurrencyMode::All),
            "none" => Ok(ConcurrencyMode::None),
            "auto" => Ok(ConcurrencyMode::Auto),
            other => Err(ConcurrencyModeParseError::new(other)),
        }
    }
}

/// A builder for [`RunEnvironment`] instances.
#[derive(Clone, Debug)]
pub struct RunEnvironmentBuilder {
    concurrency: ConcurrencyMode,
    include_filters: Vec<String>,
    exclude_filters: Vec<String>,
    exclude_tests: BTreeSet<String>,
    execute: bool,
    capture_dmesg: bool,
    valgrind: bool,
}

impl Default for RunEnvironmentBuilder {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyMode::default(),
            include_filters: Vec::new(),
            exclude_filters: Vec::new(),
            exclude_tests: BTreeSet::new(),
            execute: true,
            capture_dmesg: false,
            valgrind: false,
        }
    }
}

impl RunEnvironmentBuilder {
    /// Creates a new builder with default settings: auto concurrency, no
    /// filters, execution enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency mode.
    pub fn set_concurrency(&mut self, mode: ConcurrencyMode) -> &mut Self {
        self.concurrency = mode;
        self
    }

    /// Adds an include pattern. A test is selected if the include list is
    /// empty or its path matches any pattern.
    pub fn add_include_filter(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.include_filters.push(pattern.into());
        self
    }

    /// Adds an exclude pattern. A test is dropped if its path matches any
    /// exclude pattern.
    pub fn add_exclude_filter(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.exclude_filters.push(pattern.into());
        self
    }

    /// Adds an exact path to the exclude set.
    pub fn add_exclude_test(&mut self, path: impl Into<String>) -> &mut Self {
        self.exclude_tests.insert(path.into());
        self
    }

    /// Sets whether tests actually execute. With `false`, a run is a dry run:
    /// tests are selected and listed but nothing is invoked or written.
    pub fn set_execute(&mut self, execute: bool) -> &mut Self {
        self.execute = execute;
        self
    }

    /// Sets whether kernel log deltas are captured around each test.
    pub fn set_capture_dmesg(&mut self, capture_dmesg: bool) -> &mut Self {
        self.capture_dmesg = capture_dmesg;
        self
    }

    /// Sets whether process-backed tests run under valgrind.
    pub fn set_valgrind(&mut self, valgrind: bool) -> &mut Self {
        self.valgrind = valgrind;
        self
    }

    /// Compiles the filter patterns and builds the environment.
    pub fn build(&self) -> Result<RunEnvironment, EnvironmentBuildError> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, EnvironmentBuildError> {
            patterns
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|error| {
                        EnvironmentBuildError::InvalidFilterPattern {
                            pattern: pattern.clone(),
                            error,
                        }
                    })
                })
                .collect()
        };

        Ok(RunEnvironment {
            concurrency: self.concurrency,
            include_filters: compile(&self.include_filters)?,
            exclude_filters: compile(&self.exclude_filters)?,
            exclude_tests: self.exclude_tests.clone(),
            execute: self.execute,
            capture_dmesg: self.capture_dmesg,
            valgrind: self.valgrind,
        })
    }
}

/// Run-wide configuration, immutable once built.
///
/// Serializes as the report's `options` blob, with filters rendered back to
/// their source patterns.
#[derive(Clone, Debug)]
pub struct RunEnvironment {
    concurrency: ConcurrencyMode,
    include_filters: Vec<Regex>,
    exclude_filters: Vec<Regex>,
    exclude_tests: BTreeSet<String>,
    execute: bool,
    capture_dmesg: bool,
    valgrind: bool,
}

impl RunEnvironment {
    /// Returns the concurrency mode for this run.
    pub fn concurrency(&self) -> ConcurrencyMode {
        self.concurrency
    }

    /// Returns true if tests actually execute (false means dry run).
    pub fn execute(&self) -> bool {
        self.execute
    }

    /// Returns true if kernel log deltas are captured around each test.
    pub fn capture_dmesg(&self) -> bool {
        self.capture_dmesg
    }

    /// Returns true if process-backed tests run under valgrind.
    pub fn valgrind(&self) -> bool {
        self.valgrind
    }

    /// Returns true if the given test path passes this environment's
    /// include/exclude rules.
    ///
    /// Exact-path exclusion short-circuits before any pattern matching.
    pub fn filter_matches(&self, path: &str) -> bool {
        if self.exclude_tests.contains(path) {
            return false;
        }
        if self.exclude_filters.iter().any(|re| re.is_match(path)) {
            return false;
        }
        self.include_filters.is_empty() || self.include_filters.iter().any(|re| re.is_match(path))
    }
}

impl Serialize for RunEnvironment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Compiled matchers serialize as their source patterns.
        let patterns = |filters: &[Regex]| -> Vec<String> {
            filters.iter().map(|re| re.as_str().to_owned()).collect()
        };

        let mut state = serializer.serialize_struct("RunEnvironment", 7)?;
        state.serialize_field("concurrency", self.concurrency.as_str())?;
        state.serialize_field("include_filters", &patterns(&self.include_filters))?;
        state.serialize_field("exclude_filters", &patterns(&self.exclude_filters))?;
        state.serialize_field("exclude_tests", &self.exclude_tests)?;
        state.serialize_field("execute", &self.execute)?;
        state.serialize_field("dmesg", &self.capture_dmesg)?;
        state.serialize_field("valgrind", &self.valgrind)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_filters_or_together() {
        let env = {
            let mut builder = RunEnvironmentBuilder::new();
            builder
                .add_include_filter("^spec/")
                .add_include_filter("glx/");
            builder.build().unwrap()
        };
        assert!(env.filter_matches("spec/glsl-1.30/preprocessor/void.frag"));
        assert!(env.filter_matches("extensions/glx/swap"));
        assert!(!env.filter_matches("other/b"));
    }

    #[test]
    fn empty_include_list_matches_everything() {
        let env = RunEnvironmentBuilder::new().build().unwrap();
        assert!(env.filter_matches("anything/at/all"));
    }

    #[test]
    fn exclude_rules_subtract() {
        let env = {
            let mut builder = RunEnvironmentBuilder::new();
            builder
                .add_exclude_filter("broken")
                .add_exclude_test("spec/a");
            builder.build().unwrap()
        };
        assert!(!env.filter_matches("spec/a"));
        assert!(!env.filter_matches("spec/broken/case"));
        assert!(env.filter_matches("spec/b"));
    }

    #[test]
    fn invalid_pattern_fails_build() {
        let mut builder = RunEnvironmentBuilder::new();
        builder.add_include_filter("ok");
        builder.add_exclude_filter("(unclosed");
        let error = builder.build().unwrap_err();
        assert!(error.to_string().contains("(unclosed"));
    }

    #[test]
    fn concurrency_mode_tokens() {
        for token in ConcurrencyMode::variants() {
            let mode: ConcurrencyMode = token.parse().unwrap();
            assert_eq!(mode.as_str(), token);
        }
        assert!("some".parse::<ConcurrencyMode>().is_err());
        assert_eq!(ConcurrencyMode::default(), ConcurrencyMode::Auto);
    }

    #[test]
    fn options_blob_serializes_patterns() {
        let env = {
            let mut builder = RunEnvironmentBuilder::new();
            builder
                .set_concurrency(ConcurrencyMode::None)
                .add_include_filter("^spec/")
                .add_exclude_test("spec/slow");
            builder.build().unwrap()
        };
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["concurrency"], "none");
        assert_eq!(value["include_filters"][0], "^spec/");
        assert_eq!(value["exclude_tests"][0], "spec/slow");
        assert_eq!(value["execute"], true);
    }
}
