// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-backed test adapter.
//!
//! An [`ExecTest`] invokes one external test binary, captures its output and
//! exit status, and classifies the outcome into a [`Status`]. Suites with
//! unusual exit conventions install an interpretation hook at construction.

use crate::{
    env::RunEnvironment,
    report::TestResult,
    status::Status,
    test::{Test, TestRunError},
};
use camino::Utf8PathBuf;
use debug_ignore::DebugIgnore;
use duct::cmd;
use std::process::{ExitStatus, Output};

/// Classifies a finished process into a result, starting from the default
/// exit-status classification.
pub type InterpretFn = Box<dyn Fn(&Output, TestResult) -> TestResult + Send + Sync>;

/// A test backed by an external executable.
#[derive(Debug)]
pub struct ExecTest {
    program: Utf8PathBuf,
    args: Vec<String>,
    thread_safe: bool,
    skip: bool,
    interpret: DebugIgnore<Option<InterpretFn>>,
}

impl ExecTest {
    /// Creates a test that invokes `program` with no arguments.
    ///
    /// Plain exec tests are thread-safe by default; tests that mutate device
    /// state should clear the flag with [`with_thread_safe`].
    ///
    /// [`with_thread_safe`]: ExecTest::with_thread_safe
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            thread_safe: true,
            skip: false,
            interpret: DebugIgnore(None),
        }
    }

    /// Sets the arguments passed to the program.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether this test may run concurrently with others.
    pub fn with_thread_safe(mut self, thread_safe: bool) -> Self {
        self.thread_safe = thread_safe;
        self
    }

    /// Marks this test as skipped without being invoked.
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Installs a custom result-interpretation hook.
    ///
    /// The hook receives the captured process output and the
    /// default-classified result, and returns the result to record. Whatever
    /// status it picks flows through unchanged.
    pub fn with_interpreter(
        mut self,
        interpret: impl Fn(&Output, TestResult) -> TestResult + Send + Sync + 'static,
    ) -> Self {
        self.interpret = DebugIgnore(Some(Box::new(interpret)));
        self
    }

    fn command(&self, env: &RunEnvironment) -> duct::Expression {
        let expression = if env.valgrind() {
            let mut args = vec!["--quiet".to_owned(), "--error-exitcode=1".to_owned()];
            args.push(self.program.to_string());
            args.extend(self.args.iter().cloned());
            cmd("valgrind", args)
        } else {
            cmd(self.program.as_str(), &self.args)
        };
        expression.stdout_capture().stderr_capture().unchecked()
    }
}

impl Test for ExecTest {
    fn thread_safe(&self) -> bool {
        self.thread_safe
    }

    fn skip(&self) -> bool {
        self.skip
    }

    fn run(&self, env: &RunEnvironment) -> Result<TestResult, TestRunError> {
        let dmesg_before = env.capture_dmesg().then(read_dmesg).flatten();

        let output = self.command(env).run()?;

        let mut result = TestResult::new(classify_exit(&output.status));
        result.returncode = output.status.code();
        result.out = Some(String::from_utf8_lossy(&output.stdout).into_owned());
        result.err = Some(String::from_utf8_lossy(&output.stderr).into_owned());

        if let Some(interpret) = &self.interpret.0 {
            result = interpret(&output, result);
        }

        if let Some(before) = dmesg_before {
            if let Some(after) = read_dmesg() {
                let delta = dmesg_delta(&before, &after);
                if !delta.is_empty() {
                    result.dmesg = Some(delta);
                    result.status = result.status.with_dmesg();
                }
            }
        }

        Ok(result)
    }
}

/// Default classification: clean exit is a pass, a nonzero code is a fail,
/// and death by signal is a crash.
fn classify_exit(status: &ExitStatus) -> Status {
    if status.success() {
        Status::Pass
    } else if status.code().is_some() {
        Status::Fail
    } else {
        Status::Crash
    }
}

fn read_dmesg() -> Option<String> {
    cmd("dmesg", std::iter::empty::<&str>())
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .ok()
        .map(|output| String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Kernel log lines that appeared after `before` was captured. The log is
/// append-only between the two reads unless the ring buffer wrapped; on a
/// wrap the whole new capture is the delta.
fn dmesg_delta(before: &str, after: &str) -> String {
    match after.strip_prefix(before) {
        Some(delta) => delta.to_owned(),
        None => after.to_owned(),
    }
}
