// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The on-disk run report: the per-test result record, the streaming writer
//! that appends results while a run is in progress, and the loader that
//! materializes (and if necessary repairs) a persisted report.

mod result;
mod store;
mod writer;

pub use result::TestResult;
pub use store::RunReport;
pub use writer::ReportWriter;

/// One indent level. Structural, not cosmetic: the repair scan in
/// [`store`] matches lines produced with exactly this width.
pub(crate) const INDENT: &str = "    ";

/// The exact line that closes every non-terminal test entry. Repair
/// truncates back to the last occurrence of this line.
pub(crate) const ENTRY_TERMINATOR: &str = "        },";

/// The exact line that closes the final test entry.
pub(crate) const FINAL_ENTRY_TERMINATOR: &str = "        }";
