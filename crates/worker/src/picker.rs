// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Three-tier job acquisition with cache affinity.
//!
//! Tier A prefers jobs whose data file is already cached locally, tier B
//! starts untouched experiments (keeping one experiment per node when the
//! backlog allows), tier C takes anything pending. Candidate list heads are
//! shuffled so peers racing over the same backlog mostly collide on
//! different rows; the tail stays in primary-key order to keep dispatch
//! FIFO-ish when the backlog dwarfs the fleet.

use crate::board::JobBoard;
use rand::seq::SliceRandom;
use rtt_core::paths;
use rtt_db::{DbError, JobCandidate, JobClaim};
use std::path::{Path, PathBuf};

/// Candidate lists are capped at this multiple of the fleet-size hint.
const POOL_FACTOR: usize = 4;

/// Picks and claims one job per call.
pub struct Picker<'a, B: JobBoard> {
    board: &'a B,
    cache_data_dir: PathBuf,
}

impl<'a, B: JobBoard> Picker<'a, B> {
    pub fn new(board: &'a B, cache_data_dir: &Path) -> Self {
        Self {
            board,
            cache_data_dir: cache_data_dir.to_path_buf(),
        }
    }

    /// Run the cascade. Returns the first claim won, or `None` when every
    /// tier came up empty or lost all its races.
    pub async fn pick(&self, num_workers: usize) -> Result<Option<JobClaim>, DbError> {
        let pool = POOL_FACTOR * num_workers.max(1);

        if let Some(claim) = self.pick_cached(num_workers, pool).await? {
            tracing::info!(job_id = claim.job_id, experiment_id = claim.experiment_id, "claimed cache-affine job");
            return Ok(Some(claim));
        }
        if let Some(claim) = self.pick_fresh_experiment(num_workers, pool).await? {
            tracing::info!(job_id = claim.job_id, experiment_id = claim.experiment_id, "claimed job of fresh experiment");
            return Ok(Some(claim));
        }
        if let Some(claim) = self.pick_any(num_workers, pool).await? {
            tracing::info!(job_id = claim.job_id, experiment_id = claim.experiment_id, "claimed pending job");
            return Ok(Some(claim));
        }
        Ok(None)
    }

    /// Tier A: experiments whose data file is already in the local cache.
    async fn pick_cached(&self, head: usize, pool: usize) -> Result<Option<JobClaim>, DbError> {
        let mut ids = self.board.pending_experiment_ids(pool).await?;
        shuffle_head(&mut ids, head);

        for experiment_id in ids {
            if !paths::data_file(&self.cache_data_dir, experiment_id).exists() {
                continue;
            }
            let mut jobs = self
                .board
                .pending_jobs_of_experiment(experiment_id, pool)
                .await?;
            shuffle_head(&mut jobs, head);
            if let Some(claim) = self.try_claim_each(jobs).await? {
                return Ok(Some(claim));
            }
        }
        Ok(None)
    }

    /// Tier B: experiments nobody has started yet. The winner also moves the
    /// experiment to `running` (idempotent, guarded on `pending`).
    async fn pick_fresh_experiment(
        &self,
        head: usize,
        pool: usize,
    ) -> Result<Option<JobClaim>, DbError> {
        let mut experiments = self.board.pending_experiments(pool).await?;
        shuffle_head(&mut experiments, head);

        for experiment_id in experiments {
            let mut jobs = self
                .board
                .pending_jobs_of_experiment(experiment_id, pool)
                .await?;
            shuffle_head(&mut jobs, head);
            if let Some(claim) = self.try_claim_each(jobs).await? {
                self.board.mark_experiment_running(experiment_id).await?;
                return Ok(Some(claim));
            }
        }
        Ok(None)
    }

    /// Tier C: any pending job.
    async fn pick_any(&self, head: usize, pool: usize) -> Result<Option<JobClaim>, DbError> {
        let mut jobs = self.board.pending_jobs(pool).await?;
        shuffle_head(&mut jobs, head);
        self.try_claim_each(jobs).await
    }

    /// Attempt candidates in order; a lost CAS moves to the next one, a job
    /// with an unknown battery tag is skipped.
    async fn try_claim_each(
        &self,
        candidates: Vec<JobCandidate>,
    ) -> Result<Option<JobClaim>, DbError> {
        for candidate in candidates {
            match self.board.claim(&candidate).await {
                Ok(Some(claim)) => return Ok(Some(claim)),
                Ok(None) => {
                    tracing::debug!(job_id = candidate.id, "claim lost, trying next candidate");
                }
                Err(DbError::UnknownBattery { job_id, ref tag }) => {
                    tracing::warn!(job_id, tag = %tag, "skipping job with unknown battery tag");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

/// Shuffle the first `head` entries uniformly at random; the tail keeps its
/// order.
pub(crate) fn shuffle_head<T>(items: &mut [T], head: usize) {
    let head = head.min(items.len());
    items[..head].shuffle(&mut rand::rng());
}

#[cfg(test)]
#[path = "picker_tests.rs"]
mod tests;
