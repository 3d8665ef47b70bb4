// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::ReportLoadError,
    report::{TestResult, ENTRY_TERMINATOR, FINAL_ENTRY_TERMINATOR},
    status::Status,
    system::SystemInfo,
};
use camino::Utf8Path;
use serde::Deserialize;
use serde_json::error::Category;
use std::collections::BTreeMap;

/// A fully materialized run report.
///
/// During a live run results exist only in the streaming file; this type is
/// the read-side view, produced by [`load`](RunReport::load) when a report is
/// re-opened for inspection. Loading a file that was left open by a crashed
/// run repairs it in memory first; the file itself is never written to, so a
/// report can be inspected while the run that produces it is still going.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// The run's name.
    pub name: String,

    /// The options blob recorded at the start of the run.
    pub options: Option<serde_json::Value>,

    /// Ambient system information recorded with the run.
    pub system_info: SystemInfo,

    /// Total wall-clock time of the run, in seconds.
    ///
    /// Absent from repaired reports: the writer records it only at a clean
    /// finish.
    pub time_elapsed: Option<f64>,

    /// Results keyed by test path.
    pub tests: BTreeMap<String, TestResult>,
}

/// The serialized form. `deny_unknown_fields` makes an unrecognized top-level
/// key a fatal load error rather than something to silently drop: it signals
/// a foreign or corrupted file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReport {
    name: String,
    #[serde(default)]
    options: Option<serde_json::Value>,
    #[serde(default)]
    glxinfo: Option<String>,
    #[serde(default)]
    wglinfo: Option<String>,
    #[serde(default)]
    lspci: Option<String>,
    #[serde(default)]
    time_elapsed: Option<f64>,
    #[serde(default)]
    tests: BTreeMap<String, TestResult>,
}

impl From<RawReport> for RunReport {
    fn from(raw: RawReport) -> Self {
        Self {
            name: raw.name,
            options: raw.options,
            system_info: SystemInfo {
                glxinfo: raw.glxinfo,
                wglinfo: raw.wglinfo,
                lspci: raw.lspci,
            },
            time_elapsed: raw.time_elapsed,
            tests: raw.tests,
        }
    }
}

impl RunReport {
    /// Loads a report from disk, repairing a truncated file if necessary.
    pub fn load(path: &Utf8Path) -> Result<Self, ReportLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|error| ReportLoadError::Read {
            path: path.to_owned(),
            error,
        })?;
        Self::from_contents(&contents, path)
    }

    fn from_contents(contents: &str, path: &Utf8Path) -> Result<Self, ReportLoadError> {
        match serde_json::from_str::<RawReport>(contents) {
            Ok(raw) => Ok(raw.into()),
            Err(error) if is_syntax_error(&error) => {
                let repaired =
                    repair_contents(contents).ok_or_else(|| ReportLoadError::Unrepairable {
                        path: path.to_owned(),
                    })?;
                match serde_json::from_str::<RawReport>(&repaired) {
                    Ok(raw) => Ok(raw.into()),
                    Err(error) if is_syntax_error(&error) => Err(ReportLoadError::Unrepairable {
                        path: path.to_owned(),
                    }),
                    Err(error) => Err(ReportLoadError::Deserialize {
                        path: path.to_owned(),
                        error,
                    }),
                }
            }
            Err(error) => Err(ReportLoadError::Deserialize {
                path: path.to_owned(),
                error,
            }),
        }
    }

    /// Returns the worst status among recorded results, if any.
    pub fn worst_status(&self) -> Option<Status> {
        self.tests.values().map(|result| result.status).max()
    }
}

fn is_syntax_error(error: &serde_json::Error) -> bool {
    matches!(error.classify(), Category::Syntax | Category::Eof)
}

/// Repairs a report left open by a crashed run.
///
/// The writer guarantees that every complete non-terminal test entry ends
/// with the exact line [`ENTRY_TERMINATOR`], so the last complete entry can
/// be found by scanning backward for it. Everything after that line is
/// discarded, the trailing comma is dropped (the entry is now the last one),
/// and the two levels of structure the writer always has open (the `tests`
/// sub-object and the report object) are closed.
///
/// Returns `None` if no terminator line exists: the file either contains no
/// complete entry or was not produced by this writer.
fn repair_contents(contents: &str) -> Option<String> {
    let lines: Vec<&str> = contents.lines().collect();
    let last_complete = lines.iter().rposition(|line| *line == ENTRY_TERMINATOR)?;

    let mut repaired_lines = lines[..last_complete].to_vec();
    repaired_lines.push(FINAL_ENTRY_TERMINATOR);
    // Close the `tests` sub-object, then the report object.
    repaired_lines.push("    }");
    repaired_lines.push("}");
    Some(repaired_lines.join("\n"))
}
