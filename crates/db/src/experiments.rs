// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Experiment transitions and result rollups.

use crate::models::{BatteryRollup, ExperimentInfo, ExperimentStatus};
use sqlx::MySqlPool;

/// Experiments still entirely untouched, in primary-key order.
pub async fn pending_experiments(pool: &MySqlPool, limit: usize) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM experiments WHERE status = 'pending' ORDER BY id LIMIT ?")
            .bind(limit as u64)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// `pending -> running`. Idempotent: only rows still pending are touched.
pub async fn mark_running(pool: &MySqlPool, experiment_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE experiments SET status = 'running', run_started = NOW() \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(experiment_id)
    .execute(pool)
    .await
    .map(|_| ())
}

/// `running -> finished`. Returns true only for the transition winner, which
/// gates the notification email so it is sent exactly once.
pub async fn mark_finished(pool: &MySqlPool, experiment_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE experiments SET status = 'finished', run_finished = NOW() \
         WHERE id = ? AND status = 'running'",
    )
    .bind(experiment_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn status(
    pool: &MySqlPool,
    experiment_id: i64,
) -> Result<Option<ExperimentStatus>, sqlx::Error> {
    let row: Option<(ExperimentStatus,)> =
        sqlx::query_as("SELECT status FROM experiments WHERE id = ?")
            .bind(experiment_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(status,)| status))
}

/// Metadata for the notification email.
pub async fn info(
    pool: &MySqlPool,
    experiment_id: i64,
) -> Result<Option<ExperimentInfo>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, name, author_email, created, config_file, data_file, data_file_sha256 \
         FROM experiments WHERE id = ?",
    )
    .bind(experiment_id)
    .fetch_optional(pool)
    .await
}

/// Expected SHA-256 of the experiment's data file, when the submitter
/// recorded one.
pub async fn data_file_sha256(
    pool: &MySqlPool,
    experiment_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT data_file_sha256 FROM experiments WHERE id = ?")
            .bind(experiment_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(digest,)| digest))
}

/// Per-battery rollups of an experiment, for the notification email.
pub async fn rollups(
    pool: &MySqlPool,
    experiment_id: i64,
) -> Result<Vec<BatteryRollup>, sqlx::Error> {
    sqlx::query_as(
        "SELECT name, passed_tests, total_tests FROM batteries \
         WHERE experiment_id = ? ORDER BY name",
    )
    .bind(experiment_id)
    .fetch_all(pool)
    .await
}

/// Delete a battery rollup so a retried job does not double-count results.
pub async fn delete_rollup(
    pool: &MySqlPool,
    experiment_id: i64,
    rollup_name: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM batteries WHERE experiment_id = ? AND name = ?")
        .bind(experiment_id)
        .bind(rollup_name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
