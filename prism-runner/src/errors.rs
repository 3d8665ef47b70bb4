// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by prism.

use crate::{env::ConcurrencyMode, status::Status};
use camino::Utf8PathBuf;
use thiserror::Error;

/// An error that occurs while parsing a [`Status`] token.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized status token: {token}\n(known tokens: {})",
    Status::variants().join(", "),
)]
pub struct StatusParseError {
    token: String,
}

impl StatusParseError {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// An error that occurs while parsing a [`ConcurrencyMode`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for concurrency mode: {input}\n(known values: {})",
    ConcurrencyMode::variants().join(", "),
)]
pub struct ConcurrencyModeParseError {
    input: String,
}

impl ConcurrencyModeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurs while building a
/// [`RunEnvironment`](crate::env::RunEnvironment).
///
/// Filter patterns are compiled before any test executes; a malformed pattern
/// fails the whole run up front.
#[derive(Debug, Error)]
pub enum EnvironmentBuildError {
    /// An include or exclude filter failed to compile as a regular expression.
    #[error("invalid filter pattern `{pattern}`")]
    InvalidFilterPattern {
        /// The pattern as supplied.
        pattern: String,

        /// The underlying regex error.
        #[source]
        error: regex::Error,
    },
}

/// An error that occurs while writing the streaming results file.
///
/// There is no recovery at this layer: the run cannot continue without a sink
/// for results.
#[derive(Debug, Error)]
pub enum WriteReportError {
    /// An error occurred while writing to the underlying file.
    #[error("error writing to results file")]
    Io(#[from] std::io::Error),

    /// A result failed to serialize to JSON.
    #[error("error serializing a test result")]
    Serialize(#[source] serde_json::Error),
}

/// An error that occurs while loading a results file.
#[derive(Debug, Error)]
pub enum ReportLoadError {
    /// The file could not be opened or read.
    ///
    /// This is an input condition, distinct from the corruption variants
    /// below: the caller may want to fall back to another location.
    #[error("failed to read results file `{path}`")]
    Read {
        /// The file being loaded.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The file did not deserialize into a run report.
    ///
    /// Covers schema violations such as an unrecognized top-level key or an
    /// unknown status token; these identify a foreign or incompatible file
    /// and are never auto-repaired.
    #[error("failed to deserialize results file `{path}`")]
    Deserialize {
        /// The file being loaded.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The file is not valid JSON and contains no complete test entry to
    /// repair back to.
    #[error("results file `{path}` is corrupt and could not be repaired")]
    Unrepairable {
        /// The file being loaded.
        path: Utf8PathBuf,
    },
}

/// An error that occurs while building a [`TestRunner`](crate::runner::TestRunner).
#[derive(Debug, Error)]
pub enum TestRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),
}
