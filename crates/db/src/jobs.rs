// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job claiming, liveness, and stuck-job recovery.
//!
//! The claim CAS on `lock_version` is the only concurrency control on the hot
//! path; there are no row locks and no `SELECT ... FOR UPDATE`. A claim that
//! affects zero rows simply lost the race.

use crate::models::{JobCandidate, JobClaim, JobStatus, StuckJob};
use rtt_core::Battery;
use sqlx::MySqlPool;

/// A job is never retried more than this many times.
pub const MAX_RETRIES: i32 = 10;

/// Reaper only considers jobs started within this window.
const STUCK_RUN_STARTED_WINDOW_SECS: i64 = 3 * 24 * 3600;

/// Heartbeat age beyond which a running job counts as stuck.
const STUCK_HEARTBEAT_AGE_SECS: i64 = 15 * 60;

/// Experiment ids that still have pending jobs, in primary-key order.
pub async fn pending_experiment_ids(
    pool: &MySqlPool,
    limit: usize,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT DISTINCT experiment_id FROM jobs \
         WHERE status = 'pending' ORDER BY experiment_id LIMIT ?",
    )
    .bind(limit as u64)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Pending jobs of one experiment, in primary-key order.
pub async fn pending_jobs_of_experiment(
    pool: &MySqlPool,
    experiment_id: i64,
    limit: usize,
) -> Result<Vec<JobCandidate>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, experiment_id, battery, lock_version FROM jobs \
         WHERE status = 'pending' AND experiment_id = ? ORDER BY id LIMIT ?",
    )
    .bind(experiment_id)
    .bind(limit as u64)
    .fetch_all(pool)
    .await
}

/// Pending jobs across the whole table, in primary-key order.
pub async fn pending_jobs(pool: &MySqlPool, limit: usize) -> Result<Vec<JobCandidate>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, experiment_id, battery, lock_version FROM jobs \
         WHERE status = 'pending' ORDER BY id LIMIT ?",
    )
    .bind(limit as u64)
    .fetch_all(pool)
    .await
}

/// Attempt to claim a candidate. Returns `Ok(None)` when another worker won
/// the race (affected rows = 0) and the claim with the bumped `lock_version`
/// on success. Replaying with a stale `lock_version` is a no-op, so the
/// statement is safe to retry on transient errors.
pub async fn claim(
    pool: &MySqlPool,
    candidate: &JobCandidate,
    battery: Battery,
    worker_key: i64,
    worker_pid: u32,
) -> Result<Option<JobClaim>, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'running', run_started = NOW(), run_heartbeat = NOW(), \
         worker_id = ?, worker_pid = ?, lock_version = lock_version + 1 \
         WHERE id = ? AND lock_version = ?",
    )
    .bind(worker_key)
    .bind(worker_pid)
    .bind(candidate.id)
    .bind(candidate.lock_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    Ok(Some(JobClaim {
        job_id: candidate.id,
        experiment_id: candidate.experiment_id,
        battery,
        lock_version: candidate.lock_version + 1,
    }))
}

/// Refresh a running job's heartbeat. Also reasserts `status` and the pid so
/// diagnostics stay accurate across forwarder restarts.
pub async fn heartbeat(pool: &MySqlPool, job_id: i64, worker_pid: u32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE jobs SET run_heartbeat = NOW(), status = 'running', worker_pid = ? WHERE id = ?",
    )
    .bind(worker_pid)
    .bind(job_id)
    .execute(pool)
    .await
    .map(|_| ())
}

/// CAS the claimed job to `finished`. Returns false when the row moved under
/// us (e.g. the reaper already reset it), in which case nothing was written.
pub async fn finish(pool: &MySqlPool, claim: &JobClaim) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'finished', run_finished = NOW(), \
         lock_version = lock_version + 1 \
         WHERE id = ? AND lock_version = ? AND status = 'running'",
    )
    .bind(claim.job_id)
    .bind(claim.lock_version)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Running jobs whose heartbeat lapsed: started within the last three days,
/// silent for fifteen minutes, and still under the retry cap.
pub async fn stuck_jobs(pool: &MySqlPool) -> Result<Vec<StuckJob>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, experiment_id, battery, lock_version, retries FROM jobs \
         WHERE status = 'running' \
           AND run_started > DATE_SUB(NOW(), INTERVAL ? SECOND) \
           AND run_heartbeat < DATE_SUB(NOW(), INTERVAL ? SECOND) \
           AND retries < ?",
    )
    .bind(STUCK_RUN_STARTED_WINDOW_SECS)
    .bind(STUCK_HEARTBEAT_AGE_SECS)
    .bind(MAX_RETRIES)
    .fetch_all(pool)
    .await
}

/// First reaper CAS: `running -> error`, charging one retry. Fails (returns
/// false) when the job moved since it was selected.
pub async fn reset_to_error(pool: &MySqlPool, job: &StuckJob) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'error', retries = retries + 1, \
         lock_version = lock_version + 1 \
         WHERE id = ? AND lock_version = ? AND status = 'running'",
    )
    .bind(job.id)
    .bind(job.lock_version)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Second reaper CAS: `error -> pending` on the post-reset `lock_version`.
pub async fn revive_to_pending(pool: &MySqlPool, job: &StuckJob) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'pending', lock_version = lock_version + 1 \
         WHERE id = ? AND lock_version = ? AND status = 'error'",
    )
    .bind(job.id)
    .bind(job.lock_version + 1)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Statuses of every job in an experiment, for the completion predicate.
pub async fn statuses_of_experiment(
    pool: &MySqlPool,
    experiment_id: i64,
) -> Result<Vec<JobStatus>, sqlx::Error> {
    let rows: Vec<(JobStatus,)> =
        sqlx::query_as("SELECT status FROM jobs WHERE experiment_id = ?")
            .bind(experiment_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(status,)| status).collect())
}
