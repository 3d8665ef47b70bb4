// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test status taxonomy.
//!
//! Statuses are totally ordered by severity so that aggregation can report
//! the worst outcome among a set of results: `notrun < skip < pass < warn <
//! dmesg-warn < fail < dmesg-fail < crash`.

use crate::errors::StatusParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The outcome severity of one test or sub-test.
///
/// Constructed from its canonical string token via [`FromStr`]; unknown
/// tokens are rejected. Serializes as the token.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Status {
    /// The test was never run.
    #[default]
    NotRun,
    /// The test chose not to run in this environment.
    Skip,
    /// The test passed.
    Pass,
    /// The test passed with warnings.
    Warn,
    /// The test passed but left new kernel log messages behind.
    DmesgWarn,
    /// The test failed.
    Fail,
    /// The test failed and left new kernel log messages behind.
    DmesgFail,
    /// The test terminated abnormally.
    Crash,
}

impl Status {
    /// Returns the canonical string token for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotRun => "notrun",
            Status::Skip => "skip",
            Status::Pass => "pass",
            Status::Warn => "warn",
            Status::DmesgWarn => "dmesg-warn",
            Status::Fail => "fail",
            Status::DmesgFail => "dmesg-fail",
            Status::Crash => "crash",
        }
    }

    /// Returns the list of known status tokens, in severity order.
    pub fn variants() -> [&'static str; 8] {
        [
            "notrun",
            "skip",
            "pass",
            "warn",
            "dmesg-warn",
            "fail",
            "dmesg-fail",
            "crash",
        ]
    }

    /// Promotes this status to its kernel-log-tainted counterpart.
    ///
    /// `pass` and `warn` become `dmesg-warn`, `fail` becomes `dmesg-fail`;
    /// every other status is returned unchanged.
    pub fn with_dmesg(self) -> Status {
        match self {
            Status::Pass | Status::Warn => Status::DmesgWarn,
            Status::Fail => Status::DmesgFail,
            other => other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = StatusParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let status = match input {
            "notrun" => Status::NotRun,
            "skip" => Status::Skip,
            "pass" => Status::Pass,
            "warn" => Status::Warn,
            "dmesg-warn" => Status::DmesgWarn,
            "fail" => Status::Fail,
            "dmesg-fail" => Status::DmesgFail,
            "crash" => Status::Crash,
            other => return Err(StatusParseError::new(other)),
        };
        Ok(status)
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order() {
        let mut statuses: Vec<Status> = Status::variants()
            .iter()
            .map(|token| token.parse().unwrap())
            .collect();
        statuses.sort();
        assert_eq!(
            statuses,
            vec![
                Status::NotRun,
                Status::Skip,
                Status::Pass,
                Status::Warn,
                Status::DmesgWarn,
                Status::Fail,
                Status::DmesgFail,
                Status::Crash,
            ]
        );
        assert!(Status::Skip < Status::Pass);
        assert!(Status::Fail < Status::Crash);
    }

    #[test]
    fn worst_status_aggregation() {
        let worst = [Status::Pass, Status::Fail, Status::Skip, Status::Warn]
            .into_iter()
            .max();
        assert_eq!(worst, Some(Status::Fail));
    }

    #[test]
    fn token_round_trip() {
        for token in Status::variants() {
            let status: Status = token.parse().unwrap();
            assert_eq!(status.as_str(), token);
        }
    }

    #[test]
    fn unknown_token_rejected() {
        let error = "incomplete".parse::<Status>().unwrap_err();
        assert!(error.to_string().contains("incomplete"));
        assert!("".parse::<Status>().is_err());
        // Tokens are case-sensitive.
        assert!("Pass".parse::<Status>().is_err());
    }

    #[test]
    fn dmesg_promotion() {
        assert_eq!(Status::Pass.with_dmesg(), Status::DmesgWarn);
        assert_eq!(Status::Warn.with_dmesg(), Status::DmesgWarn);
        assert_eq!(Status::Fail.with_dmesg(), Status::DmesgFail);
        assert_eq!(Status::Skip.with_dmesg(), Status::Skip);
        assert_eq!(Status::Crash.with_dmesg(), Status::Crash);
    }

    #[test]
    fn serde_round_trip() {
        let json = serde_json::to_string(&Status::DmesgWarn).unwrap();
        assert_eq!(json, r#""dmesg-warn""#);
        let status: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(status, Status::DmesgWarn);
        assert!(serde_json::from_str::<Status>(r#""bogus""#).is_err());
    }
}
