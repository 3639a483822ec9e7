// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row types for the tables the worker touches.

use chrono::NaiveDateTime;
use rtt_core::Battery;
use std::fmt;

/// `jobs.status` state machine. Only `pending` rows may be claimed; the
/// transition to `running` always bumps `lock_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Error,
}

impl JobStatus {
    /// Terminal states that count toward experiment completion.
    pub fn is_settled(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// `experiments.status`; transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Pending,
    Running,
    Finished,
}

/// A pending job as seen by the picker. `lock_version` is the observed value
/// the claim CAS will assert against.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobCandidate {
    pub id: i64,
    pub experiment_id: i64,
    pub battery: String,
    pub lock_version: i64,
}

/// A successfully claimed job. `lock_version` is the post-claim value, i.e.
/// the observed value plus one; the finish CAS asserts against it.
#[derive(Debug, Clone)]
pub struct JobClaim {
    pub job_id: i64,
    pub experiment_id: i64,
    pub battery: Battery,
    pub lock_version: i64,
}

/// A running job whose heartbeat has lapsed, as selected by the reaper.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StuckJob {
    pub id: i64,
    pub experiment_id: i64,
    pub battery: String,
    pub lock_version: i64,
    pub retries: i32,
}

/// Experiment metadata used by the notification email.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExperimentInfo {
    pub id: i64,
    pub name: String,
    pub author_email: Option<String>,
    pub created: Option<NaiveDateTime>,
    pub config_file: Option<String>,
    pub data_file: Option<String>,
    pub data_file_sha256: Option<String>,
}

/// Per-battery result rollup from the `batteries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BatteryRollup {
    pub name: String,
    pub passed_tests: i64,
    pub total_tests: i64,
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
