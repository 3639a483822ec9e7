// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job board: everything the worker loop asks of the database.
//!
//! The trait exists so the picker, reaper, supervisor, and completion logic
//! can be exercised against an in-memory fake; `DbBoard` is the production
//! implementation and owns the transient-retry policy for every call.

use async_trait::async_trait;
use rtt_core::RuntimeSettings;
use rtt_db::{
    with_retries, BatteryRollup, DbError, ExperimentInfo, JobCandidate, JobClaim, JobStatus,
    StuckJob,
};
use sqlx::MySqlPool;

#[async_trait]
pub trait JobBoard: Send + Sync {
    // Candidate listing
    async fn pending_experiment_ids(&self, limit: usize) -> Result<Vec<i64>, DbError>;
    async fn pending_jobs_of_experiment(
        &self,
        experiment_id: i64,
        limit: usize,
    ) -> Result<Vec<JobCandidate>, DbError>;
    async fn pending_experiments(&self, limit: usize) -> Result<Vec<i64>, DbError>;
    async fn pending_jobs(&self, limit: usize) -> Result<Vec<JobCandidate>, DbError>;

    // Claim protocol
    async fn claim(&self, candidate: &JobCandidate) -> Result<Option<JobClaim>, DbError>;
    async fn mark_experiment_running(&self, experiment_id: i64) -> Result<(), DbError>;

    // Liveness and finalization
    async fn heartbeat(&self, job_id: i64) -> Result<(), DbError>;
    async fn finish(&self, claim: &JobClaim) -> Result<bool, DbError>;

    // Reaper
    async fn stuck_jobs(&self) -> Result<Vec<StuckJob>, DbError>;
    async fn reset_to_error(&self, job: &StuckJob) -> Result<bool, DbError>;
    async fn purge_rollup(&self, experiment_id: i64, rollup_name: &str) -> Result<u64, DbError>;
    async fn revive_to_pending(&self, job: &StuckJob) -> Result<bool, DbError>;

    // Completion
    async fn job_statuses(&self, experiment_id: i64) -> Result<Vec<JobStatus>, DbError>;
    async fn finish_experiment(&self, experiment_id: i64) -> Result<bool, DbError>;
    async fn experiment_info(&self, experiment_id: i64) -> Result<Option<ExperimentInfo>, DbError>;
    async fn rollups(&self, experiment_id: i64) -> Result<Vec<BatteryRollup>, DbError>;
    async fn data_file_sha256(&self, experiment_id: i64) -> Result<Option<String>, DbError>;

    // Registry and settings
    async fn runtime_settings(&self) -> Result<RuntimeSettings, DbError>;
    async fn refresh_worker(&self) -> Result<(), DbError>;
    async fn deactivate_worker(&self) -> Result<(), DbError>;
}

/// Production board backed by the MySQL pool.
#[derive(Clone)]
pub struct DbBoard {
    pool: MySqlPool,
    worker_key: i64,
    worker_pid: u32,
    worker_address: Option<String>,
}

impl DbBoard {
    pub fn new(pool: MySqlPool, worker_key: i64, worker_address: Option<String>) -> Self {
        Self {
            pool,
            worker_key,
            worker_pid: std::process::id(),
            worker_address,
        }
    }
}

#[async_trait]
impl JobBoard for DbBoard {
    async fn pending_experiment_ids(&self, limit: usize) -> Result<Vec<i64>, DbError> {
        with_retries("list pending experiment ids", || {
            rtt_db::jobs::pending_experiment_ids(&self.pool, limit)
        })
        .await
    }

    async fn pending_jobs_of_experiment(
        &self,
        experiment_id: i64,
        limit: usize,
    ) -> Result<Vec<JobCandidate>, DbError> {
        with_retries("list pending jobs of experiment", || {
            rtt_db::jobs::pending_jobs_of_experiment(&self.pool, experiment_id, limit)
        })
        .await
    }

    async fn pending_experiments(&self, limit: usize) -> Result<Vec<i64>, DbError> {
        with_retries("list pending experiments", || {
            rtt_db::experiments::pending_experiments(&self.pool, limit)
        })
        .await
    }

    async fn pending_jobs(&self, limit: usize) -> Result<Vec<JobCandidate>, DbError> {
        with_retries("list pending jobs", || {
            rtt_db::jobs::pending_jobs(&self.pool, limit)
        })
        .await
    }

    async fn claim(&self, candidate: &JobCandidate) -> Result<Option<JobClaim>, DbError> {
        let battery: rtt_core::Battery =
            candidate
                .battery
                .parse()
                .map_err(|_| DbError::UnknownBattery {
                    job_id: candidate.id,
                    tag: candidate.battery.clone(),
                })?;
        // Replaying the CAS with a stale lock_version is a no-op, so
        // transient errors are retried like any other statement.
        with_retries("claim job", || {
            rtt_db::jobs::claim(
                &self.pool,
                candidate,
                battery,
                self.worker_key,
                self.worker_pid,
            )
        })
        .await
    }

    async fn mark_experiment_running(&self, experiment_id: i64) -> Result<(), DbError> {
        with_retries("mark experiment running", || {
            rtt_db::experiments::mark_running(&self.pool, experiment_id)
        })
        .await
    }

    async fn heartbeat(&self, job_id: i64) -> Result<(), DbError> {
        with_retries("job heartbeat", || {
            rtt_db::jobs::heartbeat(&self.pool, job_id, self.worker_pid)
        })
        .await
    }

    async fn finish(&self, claim: &JobClaim) -> Result<bool, DbError> {
        with_retries("finish job", || rtt_db::jobs::finish(&self.pool, claim)).await
    }

    async fn stuck_jobs(&self) -> Result<Vec<StuckJob>, DbError> {
        with_retries("list stuck jobs", || rtt_db::jobs::stuck_jobs(&self.pool)).await
    }

    async fn reset_to_error(&self, job: &StuckJob) -> Result<bool, DbError> {
        with_retries("reset stuck job", || {
            rtt_db::jobs::reset_to_error(&self.pool, job)
        })
        .await
    }

    async fn purge_rollup(&self, experiment_id: i64, rollup_name: &str) -> Result<u64, DbError> {
        with_retries("purge battery rollup", || {
            rtt_db::experiments::delete_rollup(&self.pool, experiment_id, rollup_name)
        })
        .await
    }

    async fn revive_to_pending(&self, job: &StuckJob) -> Result<bool, DbError> {
        with_retries("revive stuck job", || {
            rtt_db::jobs::revive_to_pending(&self.pool, job)
        })
        .await
    }

    async fn job_statuses(&self, experiment_id: i64) -> Result<Vec<JobStatus>, DbError> {
        with_retries("list job statuses", || {
            rtt_db::jobs::statuses_of_experiment(&self.pool, experiment_id)
        })
        .await
    }

    async fn finish_experiment(&self, experiment_id: i64) -> Result<bool, DbError> {
        with_retries("finish experiment", || {
            rtt_db::experiments::mark_finished(&self.pool, experiment_id)
        })
        .await
    }

    async fn experiment_info(&self, experiment_id: i64) -> Result<Option<ExperimentInfo>, DbError> {
        with_retries("experiment info", || {
            rtt_db::experiments::info(&self.pool, experiment_id)
        })
        .await
    }

    async fn rollups(&self, experiment_id: i64) -> Result<Vec<BatteryRollup>, DbError> {
        with_retries("battery rollups", || {
            rtt_db::experiments::rollups(&self.pool, experiment_id)
        })
        .await
    }

    async fn data_file_sha256(&self, experiment_id: i64) -> Result<Option<String>, DbError> {
        with_retries("data file digest", || {
            rtt_db::experiments::data_file_sha256(&self.pool, experiment_id)
        })
        .await
    }

    async fn runtime_settings(&self) -> Result<RuntimeSettings, DbError> {
        with_retries("runtime settings", || {
            rtt_db::settings::runtime_settings(&self.pool)
        })
        .await
    }

    async fn refresh_worker(&self) -> Result<(), DbError> {
        with_retries("refresh worker", || {
            rtt_db::workers::refresh(&self.pool, self.worker_key, self.worker_address.as_deref())
        })
        .await
    }

    async fn deactivate_worker(&self) -> Result<(), DbError> {
        with_retries("deactivate worker", || {
            rtt_db::workers::deactivate(&self.pool, self.worker_key)
        })
        .await
    }
}

#[cfg(test)]
pub mod fake;
