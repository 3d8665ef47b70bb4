// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test abstraction and the per-test execution wrapper.
//!
//! A [`Test`] is a polymorphic unit of work; [`execute`] is the boundary that
//! turns its outcome, including errors and panics, into written report
//! entries, so that a malformed single test can never abort a run.

use crate::{
    env::RunEnvironment,
    errors::WriteReportError,
    report::{ReportWriter, TestResult},
    status::Status,
    time::stopwatch,
};
use std::{io::Write, panic::AssertUnwindSafe};
use tracing::{debug, info};

/// The error type a test's `run` may return. Adapters surface whatever error
/// they like; the executor folds it into the test's recorded result.
pub type TestRunError = Box<dyn std::error::Error + Send + Sync>;

/// A single unit of work, addressed by a `/`-joined path within a
/// [`TestProfile`](crate::profile::TestProfile).
///
/// Implementations differ in how they invoke and interpret an external
/// program; the scheduler only cares about this contract.
pub trait Test: Send + Sync {
    /// Whether this test may run concurrently with other tests.
    ///
    /// Fixed at construction. Tests that mutate device state should return
    /// false so the scheduler routes them to the sequential pool.
    fn thread_safe(&self) -> bool;

    /// Whether this test should be skipped without being invoked.
    fn skip(&self) -> bool {
        false
    }

    /// Produces this test's result.
    ///
    /// Callers must not assume this is panic-free; [`execute`] catches both
    /// errors and panics.
    fn run(&self, env: &RunEnvironment) -> Result<TestResult, TestRunError>;
}

/// Runs one test and writes its entry (or, for a multi-sub-test result, one
/// entry per sub-test) to the report.
///
/// Under a dry run (`env.execute()` false) nothing is invoked and nothing is
/// written. A test whose `run` errors or panics produces a `fail` result
/// carrying the diagnostic text; only writer I/O failures escape this
/// function, and those are fatal to the run.
///
/// Returns the statuses written, in entry order.
pub fn execute<W: Write>(
    test: &dyn Test,
    env: &RunEnvironment,
    path: &str,
    writer: &ReportWriter<W>,
) -> Result<Vec<Status>, WriteReportError> {
    if !env.execute() {
        debug!(target: "prism", %path, "dry-run");
        return Ok(Vec::new());
    }

    let result = if test.skip() {
        TestResult::new(Status::Skip)
    } else {
        debug!(target: "prism", %path, "running");
        let watch = stopwatch();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| test.run(env)));
        let elapsed = watch.snapshot().duration.as_secs_f64();

        match outcome {
            Ok(Ok(mut result)) => {
                if result.time.is_none() {
                    result.time = Some(elapsed);
                }
                result
            }
            Ok(Err(error)) => failure_result(error.to_string(), error_chain(&*error), elapsed),
            Err(payload) => {
                failure_result(panic_message(&*payload), "test panicked".to_owned(), elapsed)
            }
        }
    };

    info!(target: "prism", %path, status = %result.status, "finished");

    if result.subtests.len() > 1 {
        let mut statuses = Vec::with_capacity(result.subtests.len());
        for (name, status) in &result.subtests {
            let mut subresult = result.clone();
            subresult.status = *status;
            writer.write_test(&format!("{path}/{name}"), &subresult)?;
            statuses.push(*status);
        }
        Ok(statuses)
    } else {
        writer.write_test(path, &result)?;
        Ok(vec![result.status])
    }
}

fn failure_result(exception: String, traceback: String, elapsed: f64) -> TestResult {
    let mut result = TestResult::new(Status::Fail);
    result.time = Some(elapsed);
    result.exception = Some(exception);
    result.traceback = Some(traceback);
    result
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(&format!("\ncaused by: {cause}"));
        source = cause.source();
    }
    chain
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{env::RunEnvironmentBuilder, system::SystemInfo, test_helpers::FnTest};
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn test_writer() -> ReportWriter<Vec<u8>> {
        ReportWriter::new(Vec::new(), "test", &json!({}), &SystemInfo::default()).unwrap()
    }

    fn written_tests(writer: ReportWriter<Vec<u8>>) -> serde_json::Value {
        let out = writer.finish(0.0).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&String::from_utf8(out).unwrap()).unwrap();
        value["tests"].take()
    }

    #[test]
    fn ok_result_gets_measured_time() {
        let env = RunEnvironmentBuilder::new().build().unwrap();
        let writer = test_writer();
        let test = FnTest::new(|_| Ok(TestResult::new(Status::Pass)));

        let statuses = execute(&test, &env, "spec/a", &writer).unwrap();
        assert_eq!(statuses, vec![Status::Pass]);

        let tests = written_tests(writer);
        assert_eq!(tests["spec/a"]["result"], "pass");
        assert!(tests["spec/a"]["time"].as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn adapter_supplied_time_is_preserved() {
        let env = RunEnvironmentBuilder::new().build().unwrap();
        let writer = test_writer();
        let test = FnTest::new(|_| {
            let mut result = TestResult::new(Status::Pass);
            result.time = Some(42.0);
            Ok(result)
        });

        execute(&test, &env, "spec/a", &writer).unwrap();
        let tests = written_tests(writer);
        assert_eq!(tests["spec/a"]["time"], json!(42.0));
    }

    #[test]
    fn erroring_test_records_a_fail_with_diagnostics() {
        let env = RunEnvironmentBuilder::new().build().unwrap();
        let writer = test_writer();
        let test = FnTest::new(|_| Err("device wedged".into()));

        let statuses = execute(&test, &env, "spec/a", &writer).unwrap();
        assert_eq!(statuses, vec![Status::Fail]);

        let tests = written_tests(writer);
        assert_eq!(tests["spec/a"]["result"], "fail");
        assert_eq!(tests["spec/a"]["exception"], "device wedged");
        assert!(!tests["spec/a"]["traceback"]
            .as_str()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn panicking_test_records_a_fail() {
        let env = RunEnvironmentBuilder::new().build().unwrap();
        let writer = test_writer();
        let test = FnTest::new(|_| panic!("unexpected GL state"));

        let statuses = execute(&test, &env, "spec/a", &writer).unwrap();
        assert_eq!(statuses, vec![Status::Fail]);

        let tests = written_tests(writer);
        assert_eq!(tests["spec/a"]["exception"], "unexpected GL state");
    }

    #[test]
    fn multi_subtest_results_expand() {
        let env = RunEnvironmentBuilder::new().build().unwrap();
        let writer = test_writer();
        let test = FnTest::new(|_| {
            let mut result = TestResult::new(Status::Pass);
            result.subtests = btreemap! {
                "x".to_owned() => Status::Pass,
                "y".to_owned() => Status::Fail,
            };
            Ok(result)
        });

        let statuses = execute(&test, &env, "spec/a", &writer).unwrap();
        assert_eq!(statuses, vec![Status::Pass, Status::Fail]);

        let tests = written_tests(writer);
        assert_eq!(tests["spec/a/x"]["result"], "pass");
        assert_eq!(tests["spec/a/y"]["result"], "fail");
        assert!(tests.get("spec/a").is_none());
    }

    #[test]
    fn single_subtest_result_stays_one_entry() {
        let env = RunEnvironmentBuilder::new().build().unwrap();
        let writer = test_writer();
        let test = FnTest::new(|_| {
            let mut result = TestResult::new(Status::Pass);
            result.subtests = btreemap! { "only".to_owned() => Status::Pass };
            Ok(result)
        });

        execute(&test, &env, "spec/a", &writer).unwrap();
        let tests = written_tests(writer);
        assert_eq!(tests["spec/a"]["result"], "pass");
        assert!(tests.get("spec/a/only").is_none());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let env = {
            let mut builder = RunEnvironmentBuilder::new();
            builder.set_execute(false);
            builder.build().unwrap()
        };
        let writer = test_writer();
        let test = FnTest::new(|_| panic!("must not be invoked"));

        let statuses = execute(&test, &env, "spec/a", &writer).unwrap();
        assert!(statuses.is_empty());
        assert_eq!(written_tests(writer), json!({}));
    }

    #[test]
    fn skip_flag_short_circuits() {
        let env = RunEnvironmentBuilder::new().build().unwrap();
        let writer = test_writer();
        let test = FnTest::skipped(|_| panic!("must not be invoked"));

        let statuses = execute(&test, &env, "spec/a", &writer).unwrap();
        assert_eq!(statuses, vec![Status::Skip]);
        let tests = written_tests(writer);
        assert_eq!(tests["spec/a"]["result"], "skip");
    }
}
