// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The discovered test set and its filter pipeline.

use crate::{env::RunEnvironment, test::Test};
use debug_ignore::DebugIgnore;
use std::{collections::BTreeMap, fmt, sync::Arc};

type FilterFn = Box<dyn Fn(&str, &dyn Test) -> bool + Send + Sync>;

/// The full discovered test set: a mapping from `/`-joined path to test,
/// plus a composable pipeline of structural filters.
///
/// Paths are unique; registering a path twice keeps the later test. The map
/// is ordered by path, which fixes the default dispatch order and makes runs
/// deterministic.
#[derive(Default)]
pub struct TestProfile {
    tests: BTreeMap<String, Arc<dyn Test>>,
    filters: DebugIgnore<Vec<FilterFn>>,
}

impl TestProfile {
    /// Creates an empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a test under the given path, replacing any previous entry.
    pub fn register(&mut self, path: impl Into<String>, test: impl Test + 'static) {
        self.tests.insert(path.into(), Arc::new(test));
    }

    /// Adds a structural filter. A test survives only if every installed
    /// filter returns true for it.
    ///
    /// Callers install these before running, for example to exclude a
    /// known-broken category regardless of user-specified patterns.
    pub fn add_filter(&mut self, filter: impl Fn(&str, &dyn Test) -> bool + Send + Sync + 'static) {
        self.filters.push(Box::new(filter));
    }

    /// Merges another profile into this one. Entries from `other` overwrite
    /// same-path entries here; filter lists are not merged.
    pub fn merge(&mut self, other: TestProfile) {
        self.tests.extend(other.tests);
    }

    /// Returns the number of registered tests, before filtering.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if no tests are registered.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Computes the working test set for a run: the AND of the structural
    /// filters and the environment's include/exclude rules, in path order.
    pub fn select_tests(&self, env: &RunEnvironment) -> Vec<(String, Arc<dyn Test>)> {
        self.tests
            .iter()
            .filter(|(path, test)| {
                self.filters.iter().all(|filter| filter(path, test.as_ref()))
                    && env.filter_matches(path)
            })
            .map(|(path, test)| (path.clone(), Arc::clone(test)))
            .collect()
    }
}

impl fmt::Debug for TestProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestProfile")
            .field("tests", &self.tests.keys())
            .field("filters", &self.filters.len())
            .finish()
    }
}
