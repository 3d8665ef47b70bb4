// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The recorded outcome of one test.
///
/// Created by a test's `run`, normalized by the executor (missing time filled
/// from the measured wall interval), written exactly once, and never mutated
/// afterwards. Unset optional fields are omitted from serialization.
///
/// Adapter-specific diagnostic fields are preserved verbatim in [`extra`],
/// so a report written by a newer adapter round-trips through older readers.
///
/// [`extra`]: TestResult::extra
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TestResult {
    /// The outcome status.
    ///
    /// A legacy entry missing this field loads as [`Status::NotRun`].
    #[serde(rename = "result", default)]
    pub status: Status,

    /// Wall-clock duration of the test in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,

    /// The exit code of the test process, if the test ran one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returncode: Option<i32>,

    /// Captured standard output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,

    /// Captured standard error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,

    /// Present only on internal failure: the error's display form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,

    /// Present only on internal failure: the formatted error chain or panic
    /// location detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,

    /// Free-form diagnostic note attached by the harness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// New kernel log lines that appeared during the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dmesg: Option<String>,

    /// Per-sub-test statuses, keyed by sub-test name.
    ///
    /// With more than one entry, the executor expands this result into one
    /// written entry per sub-test.
    #[serde(
        rename = "subtest",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub subtests: BTreeMap<String, Status>,

    /// Adapter-specific diagnostic fields, passed through unmodified.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TestResult {
    /// Creates a result with the given status and no other fields set.
    pub fn new(status: Status) -> Self {
        Self {
            status,
            time: None,
            returncode: None,
            out: None,
            err: None,
            exception: None,
            traceback: None,
            note: None,
            dmesg: None,
            subtests: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}
