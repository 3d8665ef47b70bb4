// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test-profile discovery: walk a directory of external test binaries and
//! register one exec test per discovered executable.

use camino::Utf8Path;
use color_eyre::eyre::{eyre, Result, WrapErr};
use prism_runner::{exec::ExecTest, profile::TestProfile};
use walkdir::WalkDir;

/// Builds a profile from the executables under `dir`.
///
/// Test paths are the `/`-joined paths relative to `dir`, so
/// `<dir>/spec/glsl-1.30/void.frag.test` registers as
/// `spec/glsl-1.30/void.frag.test`.
pub fn discover_profile(dir: &Utf8Path) -> Result<TestProfile> {
    let mut profile = TestProfile::new();
    for entry in WalkDir::new(dir) {
        let entry =
            entry.wrap_err_with(|| format!("failed to walk test directory `{dir}`"))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
            eyre!(
                "non-UTF-8 path in test directory: {}",
                entry.path().display()
            )
        })?;
        if !is_executable(&entry)? {
            continue;
        }
        let rel = path
            .strip_prefix(dir)
            .wrap_err("walked entry escaped the test directory")?;
        let test_path = rel
            .components()
            .map(|component| component.as_str())
            .collect::<Vec<_>>()
            .join("/");
        profile.register(test_path, ExecTest::new(path.to_owned()));
    }
    Ok(profile)
}

#[cfg(unix)]
fn is_executable(entry: &walkdir::DirEntry) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = entry
        .metadata()
        .wrap_err_with(|| format!("failed to stat {}", entry.path().display()))?;
    Ok(metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(entry: &walkdir::DirEntry) -> Result<bool> {
    let executable = entry
        .path()
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
    Ok(executable)
}

/// Parses a newline-separated list of paths, expanding a leading `~/` to the
/// user's home directory. Blank lines are skipped.
pub fn parse_listfile(path: &Utf8Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read list file `{path}`"))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(expand_tilde)
        .collect())
}

fn expand_tilde(line: &str) -> String {
    if let Some(rest) = line.strip_prefix("~/") {
        if let Some(home) = home::home_dir() {
            return format!("{}/{rest}", home.display());
        }
    }
    line.to_owned()
}
