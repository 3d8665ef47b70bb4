// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::WriteReportError,
    report::{TestResult, INDENT},
    system::SystemInfo,
};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::{io::Write, sync::Mutex};

/// Streams a run report to a writer as results arrive.
///
/// Construction emits the report preamble (`options`, `name`, collected
/// system info) and opens the `tests` sub-object; [`write_test`] appends one
/// complete member per call; [`finish`] closes the structure and records the
/// elapsed time.
///
/// `ReportWriter` is thread-safe: each `write_test` call emits its whole
/// member (separating comma, newline, key, and value) under a single critical
/// section and flushes before releasing it, so results from concurrently
/// completing tests interleave only at member boundaries. A reader scanning
/// the file line by line can always identify the end of a complete entry,
/// which is what the crash repair in [`RunReport`](crate::report::RunReport)
/// relies on.
///
/// Nothing is buffered beyond the call that produced it: a crash loses at
/// most the entry being written.
///
/// [`write_test`]: ReportWriter::write_test
/// [`finish`]: ReportWriter::finish
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    state: Mutex<WriterState<W>>,
}

#[derive(Debug)]
struct WriterState<W: Write> {
    out: W,
    tests_empty: bool,
}

impl<W: Write> ReportWriter<W> {
    /// Begins a report: writes the preamble members and opens the `tests`
    /// sub-object.
    pub fn new(
        mut out: W,
        name: &str,
        options: &impl Serialize,
        system_info: &SystemInfo,
    ) -> Result<Self, WriteReportError> {
        let mut preamble = String::from("{");
        let mut first = true;
        append_member(&mut preamble, &mut first, "options", options)?;
        append_member(&mut preamble, &mut first, "name", &name)?;
        for (key, value) in system_info.entries() {
            append_member(&mut preamble, &mut first, key, &value)?;
        }
        preamble.push_str(",\n");
        preamble.push_str(INDENT);
        preamble.push_str("\"tests\": {");

        out.write_all(preamble.as_bytes())?;
        out.flush()?;

        Ok(Self {
            state: Mutex::new(WriterState {
                out,
                tests_empty: true,
            }),
        })
    }

    /// Appends one test entry.
    ///
    /// Safe to call from any number of threads; completion order determines
    /// file order.
    pub fn write_test(&self, path: &str, result: &TestResult) -> Result<(), WriteReportError> {
        let mut state = self.state.lock().expect("result writer lock poisoned");

        let mut entry = String::new();
        if state.tests_empty {
            state.tests_empty = false;
        } else {
            entry.push(',');
        }
        entry.push('\n');
        entry.push_str(INDENT);
        entry.push_str(INDENT);
        entry.push_str(&render_key(path)?);
        entry.push_str(": ");
        entry.push_str(&render_value(result, 2)?);

        state.out.write_all(entry.as_bytes())?;
        state.out.flush()?;
        Ok(())
    }

    /// Closes the `tests` sub-object, records the elapsed time, closes the
    /// report object, and returns the underlying writer.
    pub fn finish(self, time_elapsed: f64) -> Result<W, WriteReportError> {
        let state = self
            .state
            .into_inner()
            .expect("result writer lock poisoned");
        let mut out = state.out;

        let mut tail = String::from("\n");
        tail.push_str(INDENT);
        tail.push_str("},\n");
        tail.push_str(INDENT);
        tail.push_str("\"time_elapsed\": ");
        tail.push_str(&render_value(&time_elapsed, 1)?);
        tail.push_str("\n}");

        out.write_all(tail.as_bytes())?;
        out.flush()?;
        Ok(out)
    }
}

fn render_key(key: &str) -> Result<String, WriteReportError> {
    serde_json::to_string(key).map_err(WriteReportError::Serialize)
}

/// Renders `value` as pretty JSON at the fixed indent width, with every line
/// after the first re-indented to `level`. The first line stays bare so it
/// can follow a `"key": ` prefix.
fn render_value<T: Serialize + ?Sized>(value: &T, level: usize) -> Result<String, WriteReportError> {
    let mut bytes = Vec::new();
    let formatter = PrettyFormatter::with_indent(INDENT.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    value
        .serialize(&mut ser)
        .map_err(WriteReportError::Serialize)?;
    let rendered = String::from_utf8(bytes).expect("serde_json output is valid UTF-8");

    let mut reindented = String::with_capacity(rendered.len());
    for (i, line) in rendered.split('\n').enumerate() {
        if i > 0 {
            reindented.push('\n');
            for _ in 0..level {
                reindented.push_str(INDENT);
            }
        }
        reindented.push_str(line);
    }
    Ok(reindented)
}

fn append_member<T: Serialize + ?Sized>(
    buf: &mut String,
    first: &mut bool,
    key: &str,
    value: &T,
) -> Result<(), WriteReportError> {
    if *first {
        *first = false;
    } else {
        buf.push(',');
    }
    buf.push('\n');
    buf.push_str(INDENT);
    buf.push_str(&render_key(key)?);
    buf.push_str(": ");
    buf.push_str(&render_value(value, 1)?);
    Ok(())
}
