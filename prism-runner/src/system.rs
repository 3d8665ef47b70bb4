// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ambient system information attached to a run report.
//!
//! The harness treats this as an opaque blob: each tool's combined output is
//! stored as a string under its own report key, and a tool that cannot be
//! invoked records a placeholder rather than failing the run.

use duct::cmd;

/// Output of the ambient system-information tools, one report key per tool.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SystemInfo {
    /// Output of `glxinfo` (unix).
    pub glxinfo: Option<String>,

    /// Output of `wglinfo` (windows).
    pub wglinfo: Option<String>,

    /// Output of `lspci` (linux).
    pub lspci: Option<String>,
}

impl SystemInfo {
    /// Collects system information for the current host.
    pub fn collect() -> Self {
        let mut info = Self::default();
        if cfg!(windows) {
            info.wglinfo = Some(run_tool("wglinfo"));
        } else {
            info.glxinfo = Some(run_tool("glxinfo"));
        }
        if cfg!(target_os = "linux") {
            info.lspci = Some(run_tool("lspci"));
        }
        info
    }

    /// Iterates over the collected entries as (report key, output) pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("glxinfo", self.glxinfo.as_deref()),
            ("wglinfo", self.wglinfo.as_deref()),
            ("lspci", self.lspci.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
    }

    /// Returns true if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }
}

fn run_tool(name: &str) -> String {
    let invocation = cmd(name, std::iter::empty::<&str>())
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run();
    match invocation {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stdout));
            text
        }
        Err(_) => format!("Failed to run {name}"),
    }
}
