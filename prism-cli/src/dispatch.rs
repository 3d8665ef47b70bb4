// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line dispatch for the `prism` binary.

use crate::discover::{discover_profile, parse_listfile};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Result, WrapErr};
use prism_runner::{
    env::{ConcurrencyMode, RunEnvironment, RunEnvironmentBuilder},
    report::{ReportWriter, RunReport},
    runner::TestRunner,
    status::Status,
    system::SystemInfo,
};
use std::{collections::BTreeMap, sync::Arc};

/// A conformance-test harness for graphics drivers.
#[derive(Debug, Parser)]
#[command(name = "prism", version, about)]
pub struct PrismApp {
    /// Print per-test progress while running
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl PrismApp {
    /// Executes the selected subcommand, returning the process exit code.
    pub fn exec(self) -> Result<i32> {
        tracing_subscriber::fmt()
            .with_max_level(if self.verbose {
                tracing_subscriber::filter::LevelFilter::DEBUG
            } else {
                tracing_subscriber::filter::LevelFilter::WARN
            })
            .with_target(false)
            .init();

        match self.command {
            Command::Run {
                opts,
                test_dir,
                results_file,
            } => run_tests(opts, test_dir, results_file),
            Command::List { filter, test_dir } => list_tests(filter, test_dir),
            Command::Show {
                failures,
                results_file,
            } => show_report(failures, results_file),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run tests and stream results to a report file
    Run {
        #[command(flatten)]
        opts: RunOpts,

        /// Directory containing test binaries
        #[arg(value_name = "TEST-DIR")]
        test_dir: Utf8PathBuf,

        /// Report file to write
        #[arg(value_name = "RESULTS-FILE")]
        results_file: Utf8PathBuf,
    },

    /// List the tests a run would select
    List {
        #[command(flatten)]
        filter: FilterOpts,

        /// Directory containing test binaries
        #[arg(value_name = "TEST-DIR")]
        test_dir: Utf8PathBuf,
    },

    /// Summarize a results file, repairing a crashed run's file if needed
    Show {
        /// Also list every test with status warn or worse
        #[arg(long)]
        failures: bool,

        /// Report file to read
        #[arg(value_name = "RESULTS-FILE")]
        results_file: Utf8PathBuf,
    },
}

#[derive(Debug, Args)]
struct RunOpts {
    #[command(flatten)]
    filter: FilterOpts,

    /// Run name recorded in the report [default: the results file stem]
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// How tests are routed to the worker pools
    #[arg(long, value_enum, default_value_t, value_name = "MODE")]
    concurrency: ConcurrencyOpt,

    /// Select tests without executing anything
    #[arg(long)]
    dry_run: bool,

    /// Capture kernel log deltas around each test
    #[arg(long)]
    dmesg: bool,

    /// Run test binaries under valgrind
    #[arg(long)]
    valgrind: bool,
}

#[derive(Debug, Args)]
struct FilterOpts {
    /// Only run tests whose path matches this regex (repeatable)
    #[arg(short = 't', long = "include-tests", value_name = "REGEX")]
    include: Vec<String>,

    /// Skip tests whose path matches this regex (repeatable)
    #[arg(short = 'x', long = "exclude-tests", value_name = "REGEX")]
    exclude: Vec<String>,

    /// File listing exact test paths to skip, one per line
    #[arg(long, value_name = "PATH")]
    exclude_list: Option<Utf8PathBuf>,
}

impl FilterOpts {
    fn apply(&self, builder: &mut RunEnvironmentBuilder) -> Result<()> {
        for pattern in &self.include {
            builder.add_include_filter(pattern);
        }
        for pattern in &self.exclude {
            builder.add_exclude_filter(pattern);
        }
        if let Some(list) = &self.exclude_list {
            for path in parse_listfile(list)? {
                builder.add_exclude_test(path);
            }
        }
        Ok(())
    }
}

/// How tests are routed to the worker pools.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum ConcurrencyOpt {
    /// Everything runs in the parallel pool
    All,
    /// Everything runs in the sequential pool
    None,
    /// Route each test by its own thread-safety flag
    #[default]
    Auto,
}

impl From<ConcurrencyOpt> for ConcurrencyMode {
    fn from(opt: ConcurrencyOpt) -> Self {
        match opt {
            ConcurrencyOpt::All => ConcurrencyMode::All,
            ConcurrencyOpt::None => ConcurrencyMode::None,
            ConcurrencyOpt::Auto => ConcurrencyMode::Auto,
        }
    }
}

fn build_environment(
    filter: &FilterOpts,
    concurrency: ConcurrencyOpt,
    dry_run: bool,
    dmesg: bool,
    valgrind: bool,
) -> Result<RunEnvironment> {
    let mut builder = RunEnvironmentBuilder::new();
    builder
        .set_concurrency(concurrency.into())
        .set_execute(!dry_run)
        .set_capture_dmesg(dmesg)
        .set_valgrind(valgrind);
    filter.apply(&mut builder)?;
    Ok(builder.build()?)
}

fn run_tests(opts: RunOpts, test_dir: Utf8PathBuf, results_file: Utf8PathBuf) -> Result<i32> {
    let profile = discover_profile(&test_dir)?;
    let env = build_environment(
        &opts.filter,
        opts.concurrency,
        opts.dry_run,
        opts.dmesg,
        opts.valgrind,
    )?;

    let name = opts.name.unwrap_or_else(|| {
        results_file
            .file_stem()
            .unwrap_or("results")
            .to_owned()
    });
    let system_info = if opts.dry_run {
        SystemInfo::default()
    } else {
        SystemInfo::collect()
    };

    let file = std::fs::File::create(&results_file)
        .wrap_err_with(|| format!("failed to create results file `{results_file}`"))?;
    let writer = Arc::new(ReportWriter::new(file, &name, &env, &system_info)?);

    let runner = TestRunner::new(env)?;
    let stats = runner.run(&profile, &writer)?;

    let writer =
        Arc::into_inner(writer).ok_or_else(|| eyre!("results writer still shared after run"))?;
    writer.finish(stats.duration().as_secs_f64())?;

    if stats.total() == 0 {
        println!("no tests run");
    } else {
        for (status, count) in stats.counts() {
            println!("{:>12}: {count}", status.to_string());
        }
        println!("{:>12}: {}", "total", stats.total());
    }
    println!("results written to {results_file}");

    Ok(if stats.worst_status() >= Some(Status::Fail) {
        1
    } else {
        0
    })
}

fn list_tests(filter: FilterOpts, test_dir: Utf8PathBuf) -> Result<i32> {
    let profile = discover_profile(&test_dir)?;
    let env = build_environment(&filter, ConcurrencyOpt::Auto, true, false, false)?;
    for (path, _) in profile.select_tests(&env) {
        println!("{path}");
    }
    Ok(0)
}

fn show_report(failures: bool, results_file: Utf8PathBuf) -> Result<i32> {
    let report = RunReport::load(&results_file)?;

    println!("name: {}", report.name);
    if let Some(time_elapsed) = report.time_elapsed {
        println!("time elapsed: {time_elapsed:.2}s");
    }

    let mut counts: BTreeMap<Status, usize> = BTreeMap::new();
    for result in report.tests.values() {
        *counts.entry(result.status).or_insert(0) += 1;
    }
    for (status, count) in &counts {
        println!("{:>12}: {count}", status.to_string());
    }
    println!("{:>12}: {}", "total", report.tests.len());
    if let Some(worst) = report.worst_status() {
        println!("worst status: {worst}");
    }

    if failures {
        for (path, result) in &report.tests {
            if result.status >= Status::Warn {
                println!("{}: {path}", result.status);
            }
        }
    }
    Ok(0)
}
