// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stuck-job recovery.
//!
//! A worker killed mid-job leaves its row `running` with a stale heartbeat.
//! The reaper returns such rows to `pending` through a double CAS: first
//! `running -> error` (charging a retry), then `error -> pending` on the new
//! `lock_version`. The first CAS failing means another actor moved the job
//! concurrently, and the row is left alone; the rollup purge between the two
//! steps keeps retried batteries from double-counting.

use crate::board::JobBoard;
use rtt_core::Battery;
use rtt_db::DbError;
use std::time::{Duration, Instant};

/// What one reaper pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReaperStats {
    pub examined: usize,
    pub revived: usize,
    pub skipped: usize,
}

/// Interval-gated reaper driven from the main loop.
#[derive(Debug, Default)]
pub struct Reaper {
    last_pass: Option<Instant>,
}

impl Reaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when at least `interval` elapsed since the previous pass.
    pub fn due(&self, interval: Duration) -> bool {
        match self.last_pass {
            Some(last) => last.elapsed() >= interval,
            None => true,
        }
    }

    /// Reset every stuck job the selection finds.
    pub async fn run_pass<B: JobBoard>(&mut self, board: &B) -> Result<ReaperStats, DbError> {
        self.last_pass = Some(Instant::now());

        let stuck = board.stuck_jobs().await?;
        let mut stats = ReaperStats {
            examined: stuck.len(),
            ..ReaperStats::default()
        };
        if stuck.is_empty() {
            return Ok(stats);
        }
        tracing::info!(count = stuck.len(), "resetting stuck jobs");

        for job in stuck {
            if !board.reset_to_error(&job).await? {
                // Another worker claimed or another reaper beat us; the
                // observed lock_version is stale.
                stats.skipped += 1;
                continue;
            }

            match job.battery.parse::<Battery>() {
                Ok(battery) => {
                    let purged = board
                        .purge_rollup(job.experiment_id, battery.rollup_name())
                        .await?;
                    if purged > 0 {
                        tracing::info!(
                            job_id = job.id,
                            experiment_id = job.experiment_id,
                            rollup = battery.rollup_name(),
                            purged,
                            "purged partial battery results"
                        );
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        job_id = job.id,
                        tag = %job.battery,
                        "stuck job has unknown battery tag, skipping rollup purge"
                    );
                }
            }

            if board.revive_to_pending(&job).await? {
                tracing::info!(job_id = job.id, retries = job.retries + 1, "stuck job reset");
                stats.revived += 1;
            } else {
                stats.skipped += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
