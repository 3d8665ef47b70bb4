// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closure-backed test doubles shared by unit tests.

use crate::{
    env::RunEnvironment,
    report::TestResult,
    test::{Test, TestRunError},
};

/// A [`Test`] whose body is a closure.
pub(crate) struct FnTest<F> {
    thread_safe: bool,
    skip: bool,
    body: F,
}

impl<F> FnTest<F>
where
    F: Fn(&RunEnvironment) -> Result<TestResult, TestRunError> + Send + Sync,
{
    pub(crate) fn new(body: F) -> Self {
        Self {
            thread_safe: true,
            skip: false,
            body,
        }
    }

    pub(crate) fn serial(body: F) -> Self {
        Self {
            thread_safe: false,
            skip: false,
            body,
        }
    }

    pub(crate) fn skipped(body: F) -> Self {
        Self {
            thread_safe: true,
            skip: true,
            body,
        }
    }
}

impl<F> Test for FnTest<F>
where
    F: Fn(&RunEnvironment) -> Result<TestResult, TestRunError> + Send + Sync,
{
    fn thread_safe(&self) -> bool {
        self.thread_safe
    }

    fn skip(&self) -> bool {
        self.skip
    }

    fn run(&self, env: &RunEnvironment) -> Result<TestResult, TestRunError> {
        (self.body)(env)
    }
}
