// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker main loop.
//!
//! One cooperative loop per process: refresh liveness, honor operator
//! switches, reap stuck peers, pick a job, run it, finalize it. All blocking
//! waits are interruptible by the shutdown flag.

use crate::artifacts::ArtifactFetcher;
use crate::board::JobBoard;
use crate::completion;
use crate::error::WorkerError;
use crate::mailer::Notifier;
use crate::picker::Picker;
use crate::reaper::Reaper;
use crate::runner::RunnerContext;
use crate::shutdown::Shutdown;
use crate::supervisor::{JobOutcome, Supervisor};
use chrono::Utc;
use rtt_cache::ArtifactStore;
use rtt_core::{Family, WorkerType};
use rtt_db::JobClaim;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Minimum slack kept between "now" and the run-time budget's end.
pub const MIN_TIME_SLACK: Duration = Duration::from_secs(600);

/// Sleep between empty picker passes in `--all-time` mode.
const IDLE_SLEEP: Duration = Duration::from_secs(10);

/// Sleep while the worker class is paused by an operator switch.
const PAUSE_SLEEP: Duration = Duration::from_secs(60);

/// Why the main loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Termination signal received.
    Signal,
    /// Backlog empty and the worker is not told to idle.
    NoPendingJobs,
    /// Run-time budget would not fit another job.
    TimeBudget,
    /// The `terminate-older` switch retired this worker.
    TerminateOlder,
}

/// Loop-level knobs resolved from config and CLI.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub run_time: Option<Duration>,
    pub all_time: bool,
    pub worker_type: WorkerType,
    pub max_sec_per_test: u64,
}

pub struct Worker<B, N, S>
where
    B: JobBoard,
    N: Notifier,
    S: ArtifactStore,
{
    board: B,
    notifier: N,
    fetcher: ArtifactFetcher<S>,
    runner: RunnerContext,
    shutdown: Shutdown,
    options: WorkerOptions,
    cache_data_dir: PathBuf,
    idle_sleep: Duration,
    pause_sleep: Duration,
}

impl<B, N, S> Worker<B, N, S>
where
    B: JobBoard,
    N: Notifier,
    S: ArtifactStore,
{
    pub fn new(
        board: B,
        notifier: N,
        fetcher: ArtifactFetcher<S>,
        runner: RunnerContext,
        shutdown: Shutdown,
        options: WorkerOptions,
        cache_data_dir: PathBuf,
    ) -> Self {
        Self {
            board,
            notifier,
            fetcher,
            runner,
            shutdown,
            options,
            cache_data_dir,
            idle_sleep: IDLE_SLEEP,
            pause_sleep: PAUSE_SLEEP,
        }
    }

    #[cfg(test)]
    fn with_sleeps(mut self, idle: Duration, pause: Duration) -> Self {
        self.idle_sleep = idle;
        self.pause_sleep = pause;
        self
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    /// Run until a termination trigger fires.
    pub async fn run(&self) -> Result<ExitReason, WorkerError> {
        let started = Instant::now();
        let started_utc = Utc::now();
        let mut reaper = Reaper::new();
        // Slack is sized for the slowest battery family, floored at ten
        // minutes, so an accepted job can always finish inside the budget.
        let max_job = Duration::from_secs_f64(
            self.options.max_sec_per_test as f64 * Family::BoolTest.deadline_multiplier(),
        );
        let slack = max_job.max(MIN_TIME_SLACK);

        loop {
            if self.shutdown.is_requested() {
                return Ok(ExitReason::Signal);
            }

            self.board.refresh_worker().await?;
            let settings = self.board.runtime_settings().await?;

            if settings.should_terminate(started_utc) {
                tracing::info!("terminate-older switch retired this worker");
                return Ok(ExitReason::TerminateOlder);
            }

            if let Some(until) = settings.disabled_until(self.options.worker_type, Utc::now()) {
                tracing::info!(
                    until,
                    worker_type = %self.options.worker_type,
                    "worker class paused, sleeping"
                );
                self.interruptible_sleep(self.pause_sleep).await;
                continue;
            }

            if let Some(budget) = self.options.run_time {
                if started.elapsed() + slack >= budget {
                    tracing::info!(
                        elapsed_secs = started.elapsed().as_secs(),
                        "run-time budget would not fit another job"
                    );
                    return Ok(ExitReason::TimeBudget);
                }
            }

            if reaper.due(settings.cleanup_interval()) {
                if let Err(err) = reaper.run_pass(&self.board).await {
                    tracing::warn!(error = %err, "reaper pass failed");
                }
            }

            let picker = Picker::new(&self.board, &self.cache_data_dir);
            let claim = match picker.pick(settings.num_workers()).await {
                Ok(claim) => claim,
                Err(err) => {
                    tracing::warn!(error = %err, "job pick failed, retrying");
                    self.interruptible_sleep(self.idle_sleep).await;
                    continue;
                }
            };

            match claim {
                Some(claim) => self.run_claimed(claim).await,
                None => {
                    if self.options.all_time && self.options.run_time.is_some() {
                        self.interruptible_sleep(self.idle_sleep).await;
                        continue;
                    }
                    tracing::info!("no pending jobs");
                    return Ok(ExitReason::NoPendingJobs);
                }
            }
        }
    }

    /// Fetch artifacts and supervise one claimed job. Failures leave the row
    /// `running`; the reaper revives it after the heartbeat window.
    async fn run_claimed(&self, claim: JobClaim) {
        let expected = match self.board.data_file_sha256(claim.experiment_id).await {
            Ok(digest) => digest,
            Err(err) => {
                tracing::warn!(error = %err, "cannot read expected digest, skipping verification");
                None
            }
        };

        let (data, config) = match self
            .fetcher
            .ensure(claim.experiment_id, expected.as_deref(), false)
            .await
        {
            Ok(paths) => paths,
            Err(err) => {
                tracing::error!(
                    job_id = claim.job_id,
                    experiment_id = claim.experiment_id,
                    error = %err,
                    "artifact fetch failed, leaving job for the reaper"
                );
                return;
            }
        };

        let supervisor = Supervisor::new(&self.board, &self.runner, self.shutdown.clone());
        match supervisor.run(&claim, &data, &config).await {
            Ok(JobOutcome::Success) => {
                if let Err(err) =
                    completion::finalize_job(&self.board, &self.notifier, &claim).await
                {
                    tracing::error!(job_id = claim.job_id, error = %err, "finalization failed");
                }
            }
            Ok(outcome) => {
                tracing::warn!(
                    job_id = claim.job_id,
                    ?outcome,
                    "job not finalized, reaper will recover it"
                );
            }
            Err(err) => {
                tracing::error!(job_id = claim.job_id, error = %err, "supervision failed");
            }
        }
    }

    /// Sleep that wakes early on shutdown.
    async fn interruptible_sleep(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.requested() => {}
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
