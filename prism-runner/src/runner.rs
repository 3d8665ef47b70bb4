// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test scheduler.
//!
//! The main structure in this module is [`TestRunner`], which drains a
//! profile's selected test set through two worker pools (one sequential, for
//! tests that are unsafe to run alongside anything else, and one parallel,
//! sized to the host's core count) and feeds every result to the streaming
//! report writer.

use crate::{
    env::{ConcurrencyMode, RunEnvironment},
    errors::{TestRunnerBuildError, WriteReportError},
    profile::TestProfile,
    report::ReportWriter,
    status::Status,
    test::execute,
    time::stopwatch,
};
use futures::prelude::*;
use std::{collections::BTreeMap, io::Write, sync::Arc, time::Duration};
use tokio::runtime::Runtime;

/// Schedules and executes a profile's selected tests.
///
/// Created from a [`RunEnvironment`]; owns the Tokio runtime the pools run
/// on.
#[derive(Debug)]
pub struct TestRunner {
    env: Arc<RunEnvironment>,
    test_threads: usize,
    runtime: Runtime,
}

impl TestRunner {
    /// Creates a runner for the given environment.
    pub fn new(env: RunEnvironment) -> Result<Self, TestRunnerBuildError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;
        Ok(Self {
            env: Arc::new(env),
            // The parallel pool matches host-visible parallelism; the
            // sequential pool is always exactly one worker.
            test_threads: num_cpus::get(),
            runtime,
        })
    }

    /// Returns the environment this runner was built with.
    pub fn environment(&self) -> &RunEnvironment {
        &self.env
    }

    /// Runs every selected test, returning once both pools have fully
    /// drained and every result has been written.
    ///
    /// Routing: mode `all` sends everything to the parallel pool, `none`
    /// sends everything to the sequential pool, and the auto default routes
    /// each test by its own thread-safety flag. The sequential queue runs in
    /// strict submission order; parallel completions are unordered. Only
    /// writer I/O failures abort the run.
    pub fn run<W: Write + Send + 'static>(
        &self,
        profile: &TestProfile,
        writer: &Arc<ReportWriter<W>>,
    ) -> Result<RunStats, WriteReportError> {
        let watch = stopwatch();
        let selected = profile.select_tests(&self.env);

        let (parallel, sequential): (Vec<_>, Vec<_>) = match self.env.concurrency() {
            ConcurrencyMode::All => (selected, Vec::new()),
            ConcurrencyMode::None => (Vec::new(), selected),
            ConcurrencyMode::Auto => selected
                .into_iter()
                .partition(|(_, test)| test.thread_safe()),
        };

        let (parallel_statuses, sequential_statuses) = self.runtime.block_on(async {
            let parallel_task = stream::iter(parallel)
                .map(|(path, test)| {
                    let env = Arc::clone(&self.env);
                    let writer = Arc::clone(writer);
                    Ok::<_, WriteReportError>(
                        tokio::task::spawn_blocking(move || {
                            execute(test.as_ref(), &env, &path, &writer)
                        })
                        .map(|joined| joined.expect("test execution task panicked")),
                    )
                })
                .try_buffer_unordered(self.test_threads)
                .try_concat();

            let sequential_task = async {
                let mut statuses = Vec::new();
                for (path, test) in sequential {
                    let env = Arc::clone(&self.env);
                    let writer = Arc::clone(writer);
                    let written = tokio::task::spawn_blocking(move || {
                        execute(test.as_ref(), &env, &path, &writer)
                    })
                    .await
                    .expect("test execution task panicked")?;
                    statuses.extend(written);
                }
                Ok::<_, WriteReportError>(statuses)
            };

            tokio::join!(parallel_task, sequential_task)
        });

        let mut stats = RunStats::new(watch.snapshot().duration);
        for status in parallel_statuses?.into_iter().chain(sequential_statuses?) {
            stats.record(status);
        }
        Ok(stats)
    }
}

/// Per-status counts for a completed run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    counts: BTreeMap<Status, usize>,
    duration: Duration,
}

impl RunStats {
    fn new(duration: Duration) -> Self {
        Self {
            counts: BTreeMap::new(),
            duration,
        }
    }

    fn record(&mut self, status: Status) {
        *self.counts.entry(status).or_insert(0) += 1;
    }

    /// Returns the number of written entries with the given status.
    pub fn count(&self, status: Status) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Returns the total number of written entries.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Returns the worst status seen, if anything was written.
    pub fn worst_status(&self) -> Option<Status> {
        self.counts.keys().next_back().copied()
    }

    /// Iterates over (status, count) pairs in severity order.
    pub fn counts(&self) -> impl Iterator<Item = (Status, usize)> + '_ {
        self.counts.iter().map(|(status, count)| (*status, *count))
    }

    /// Wall-clock duration of the run.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
