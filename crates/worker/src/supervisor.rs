// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised execution of the test runner.
//!
//! The child runs in its own process group so deadline and shutdown
//! termination reach the whole tree. While it runs, the supervisor drains
//! its output, heartbeats the job row every twenty seconds, and enforces the
//! per-battery deadline. A job is only reported successful on a clean exit;
//! every other outcome leaves the row `running` for the reaper.

use crate::board::JobBoard;
use crate::error::WorkerError;
use crate::runner::RunnerContext;
use crate::shutdown::Shutdown;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use rtt_cache::sha256_file;
use rtt_db::JobClaim;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Cadence of `run_heartbeat` refreshes while the child runs.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Pause between SIGTERM and the follow-up SIGINT.
const TERM_TO_INT_DELAY: Duration = Duration::from_secs(1);

/// Grace period for the child to exit after being signalled.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// How a supervised job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// Clean zero exit; the job may be finalized.
    Success,
    /// Non-zero exit; the job stays `running` for the reaper.
    Failed(ExitStatus),
    /// Deadline exceeded; process group was terminated.
    DeadlineExceeded,
    /// Worker shutdown interrupted the job.
    Interrupted,
}

pub struct Supervisor<'a, B: JobBoard> {
    board: &'a B,
    runner: &'a RunnerContext,
    shutdown: Shutdown,
    heartbeat_interval: Duration,
}

impl<'a, B: JobBoard> Supervisor<'a, B> {
    pub fn new(board: &'a B, runner: &'a RunnerContext, shutdown: Shutdown) -> Self {
        Self {
            board,
            runner,
            shutdown,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Run the claimed job to completion or termination.
    pub async fn run(
        &self,
        claim: &JobClaim,
        data_path: &Path,
        config_path: &Path,
    ) -> Result<JobOutcome, WorkerError> {
        let pre_hash = sha256_file(data_path)
            .await
            .map_err(|e| WorkerError::io(data_path, e))?;

        let mut cmd = self.runner.command(claim, config_path, data_path);
        tracing::info!(
            job_id = claim.job_id,
            experiment_id = claim.experiment_id,
            battery = %claim.battery,
            binary = %self.runner.binary(claim.battery).display(),
            "starting test runner"
        );

        let mut child = cmd.spawn().map_err(WorkerError::Spawn)?;
        let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));
        forward_output(child.stdout.take(), claim.job_id, "stdout");
        forward_output(child.stderr.take(), claim.job_id, "stderr");

        let deadline = self.runner.deadline(claim.battery);
        let deadline_sleep = tokio::time::sleep(deadline);
        tokio::pin!(deadline_sleep);

        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.map_err(WorkerError::Spawn)?;
                    if status.success() {
                        break JobOutcome::Success;
                    }
                    tracing::warn!(job_id = claim.job_id, %status, "test runner failed");
                    break JobOutcome::Failed(status);
                }
                _ = heartbeat.tick() => {
                    if let Err(err) = self.board.heartbeat(claim.job_id).await {
                        tracing::warn!(job_id = claim.job_id, error = %err, "job heartbeat failed");
                    }
                    // The worker registry rides along so `worker_last_seen`
                    // stays fresh across hours-long jobs.
                    if let Err(err) = self.board.refresh_worker().await {
                        tracing::warn!(error = %err, "worker liveness refresh failed");
                    }
                }
                _ = &mut deadline_sleep => {
                    tracing::warn!(
                        job_id = claim.job_id,
                        deadline_secs = deadline.as_secs(),
                        "job deadline exceeded, terminating process group"
                    );
                    stop_child(&mut child, pgid).await;
                    break JobOutcome::DeadlineExceeded;
                }
                _ = self.shutdown.requested() => {
                    tracing::info!(job_id = claim.job_id, "shutdown requested, stopping test runner");
                    stop_child(&mut child, pgid).await;
                    break JobOutcome::Interrupted;
                }
            }
        };

        // Detect accidental in-place mutation of the shared data file.
        let post_hash = sha256_file(data_path)
            .await
            .map_err(|e| WorkerError::io(data_path, e))?;
        if post_hash != pre_hash {
            tracing::warn!(
                job_id = claim.job_id,
                data = %data_path.display(),
                "data file changed during execution"
            );
        }

        Ok(outcome)
    }
}

/// SIGTERM then SIGINT to the process group, brief wait, then hard kill.
async fn stop_child(child: &mut tokio::process::Child, pgid: Option<Pid>) {
    if let Some(pgid) = pgid {
        let _ = killpg(pgid, Signal::SIGTERM);
        tokio::time::sleep(TERM_TO_INT_DELAY).await;
        let _ = killpg(pgid, Signal::SIGINT);
    }
    if tokio::time::timeout(KILL_WAIT, child.wait()).await.is_err() {
        tracing::warn!("child ignored termination signals, killing");
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

/// Drain one output stream to the log without ever blocking the supervisor.
fn forward_output(
    stream: Option<impl AsyncRead + Unpin + Send + 'static>,
    job_id: i64,
    label: &'static str,
) {
    let Some(stream) = stream else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(target: "runner", job_id, "{label}: {line}");
        }
    });
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
