// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line interface of the worker binary.
//!
//! Numeric `{0|1}` switches mirror the deployment tooling that templates
//! these invocations into batch-scheduler job scripts; boolean flags would
//! not survive that templating.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "rtt-worker",
    version,
    about = "Randomness-testing worker: claims jobs from the shared database and runs test batteries"
)]
pub struct Args {
    /// Worker ID to use (overrides the config)
    #[arg(short = 'i', long)]
    pub id: Option<String>,

    /// Worker name to use (overrides the config)
    #[arg(long)]
    pub name: Option<String>,

    /// Derive a fresh random worker ID from the configured one
    #[arg(long)]
    pub id_randomize: bool,

    /// Worker long-term type
    #[arg(long, value_name = "0|1")]
    pub longterm: Option<u8>,

    /// Deactivate the worker record when ending
    #[arg(long, value_name = "0|1")]
    pub deactivate: Option<u8>,

    /// Worker location info
    #[arg(long)]
    pub location: Option<String>,

    /// Worker aux info to store in the registry
    #[arg(long)]
    pub aux: Option<String>,

    /// Number of seconds the worker will run since start
    #[arg(long, value_name = "SEC")]
    pub run_time: Option<u64>,

    /// Number of seconds a single test may run (overrides the config)
    #[arg(long, value_name = "SEC")]
    pub job_time: Option<u64>,

    /// Spend all allocated time checking for jobs instead of exiting when idle
    #[arg(long, value_name = "0|1")]
    pub all_time: Option<u8>,

    /// Clean the artifact cache on termination
    #[arg(long, value_name = "0|1")]
    pub clean_cache: Option<u8>,

    /// Clean aged experiment logs on termination
    #[arg(long, value_name = "0|1")]
    pub clean_logs: Option<u8>,

    /// Log directory override
    #[arg(long, value_name = "PATH")]
    pub log_dir: Option<PathBuf>,

    /// MySQL host override
    #[arg(long)]
    pub db_host: Option<String>,

    /// MySQL port override
    #[arg(long)]
    pub db_port: Option<u16>,

    /// Reach MySQL through an SSH-forwarded local port
    #[arg(long, value_name = "0|1")]
    pub forwarded_mysql: Option<u8>,

    /// Only run cache/log cleanup, then exit
    #[arg(long, value_name = "0|1")]
    pub cleanup_only: Option<u8>,

    /// Run one stuck-job recovery pass before the main loop
    #[arg(long, value_name = "0|1")]
    pub clean_jobs: Option<u8>,

    /// Fold PBS Pro job placement info into the worker diagnostics
    #[arg(long)]
    pub pbspro: bool,

    /// Path to the INI config file
    pub config: PathBuf,
}

impl Args {
    pub fn longterm_flag(&self) -> Option<bool> {
        self.longterm.map(|v| v != 0)
    }

    pub fn deactivate_flag(&self) -> bool {
        self.deactivate.unwrap_or(0) != 0
    }

    pub fn all_time_flag(&self) -> bool {
        self.all_time.unwrap_or(0) != 0
    }

    pub fn clean_cache_flag(&self) -> bool {
        self.clean_cache.unwrap_or(0) != 0
    }

    pub fn clean_logs_flag(&self) -> bool {
        self.clean_logs.unwrap_or(0) != 0
    }

    pub fn forwarded_mysql_flag(&self) -> bool {
        self.forwarded_mysql.unwrap_or(0) != 0
    }

    pub fn cleanup_only_flag(&self) -> bool {
        self.cleanup_only.unwrap_or(0) != 0
    }

    pub fn clean_jobs_flag(&self) -> bool {
        self.clean_jobs.unwrap_or(0) != 0
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
