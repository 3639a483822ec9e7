// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory job board for tests.
//!
//! Models just enough of the table semantics to exercise the picker, the
//! reaper, and the completion logic: CAS on `lock_version`, status-guarded
//! experiment transitions, and rollup purges.

use super::JobBoard;
use async_trait::async_trait;
use rtt_core::RuntimeSettings;
use rtt_db::{
    BatteryRollup, DbError, ExperimentInfo, JobCandidate, JobClaim, JobStatus, StuckJob,
};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeJob {
    pub id: i64,
    pub experiment_id: i64,
    pub battery: String,
    pub status: JobStatus,
    pub lock_version: i64,
    pub retries: i32,
    pub stuck: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeExperimentStatus {
    Pending,
    Running,
    Finished,
}

#[derive(Debug, Clone)]
pub struct FakeExperiment {
    pub id: i64,
    pub status: FakeExperimentStatus,
    pub info: ExperimentInfo,
    pub rollups: Vec<BatteryRollup>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub jobs: Vec<FakeJob>,
    pub experiments: Vec<FakeExperiment>,
    pub settings: RuntimeSettings,
    pub heartbeats: Vec<i64>,
    pub refreshes: usize,
    pub deactivated: bool,
    pub claim_attempts: Vec<i64>,
    pub purged: Vec<(i64, String)>,
    /// Job ids whose claims always lose the CAS race.
    pub lost_claims: HashSet<i64>,
}

#[derive(Debug, Default)]
pub struct FakeBoard {
    pub state: Mutex<FakeState>,
}

impl FakeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(self, id: i64, experiment_id: i64, battery: &str) -> Self {
        self.push_job(FakeJob {
            id,
            experiment_id,
            battery: battery.to_string(),
            status: JobStatus::Pending,
            lock_version: 0,
            retries: 0,
            stuck: false,
        })
    }

    pub fn push_job(self, job: FakeJob) -> Self {
        {
            let mut state = self.lock();
            state.jobs.push(job);
        }
        self
    }

    pub fn with_experiment(self, id: i64, status: FakeExperimentStatus) -> Self {
        {
            let mut state = self.lock();
            state.experiments.push(FakeExperiment {
                id,
                status,
                info: ExperimentInfo {
                    id,
                    name: format!("experiment-{id}"),
                    author_email: None,
                    created: None,
                    config_file: None,
                    data_file: None,
                    data_file_sha256: None,
                },
                rollups: Vec::new(),
            });
        }
        self
    }

    pub fn losing_claim(self, job_id: i64) -> Self {
        {
            let mut state = self.lock();
            state.lost_claims.insert(job_id);
        }
        self
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl JobBoard for FakeBoard {
    async fn pending_experiment_ids(&self, limit: usize) -> Result<Vec<i64>, DbError> {
        let state = self.lock();
        let mut ids: Vec<i64> = state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| j.experiment_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.truncate(limit);
        Ok(ids)
    }

    async fn pending_jobs_of_experiment(
        &self,
        experiment_id: i64,
        limit: usize,
    ) -> Result<Vec<JobCandidate>, DbError> {
        let state = self.lock();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending && j.experiment_id == experiment_id)
            .take(limit)
            .map(candidate)
            .collect())
    }

    async fn pending_experiments(&self, limit: usize) -> Result<Vec<i64>, DbError> {
        let state = self.lock();
        Ok(state
            .experiments
            .iter()
            .filter(|e| e.status == FakeExperimentStatus::Pending)
            .take(limit)
            .map(|e| e.id)
            .collect())
    }

    async fn pending_jobs(&self, limit: usize) -> Result<Vec<JobCandidate>, DbError> {
        let state = self.lock();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .take(limit)
            .map(candidate)
            .collect())
    }

    async fn claim(&self, cand: &JobCandidate) -> Result<Option<JobClaim>, DbError> {
        let battery = cand
            .battery
            .parse()
            .map_err(|_| DbError::UnknownBattery {
                job_id: cand.id,
                tag: cand.battery.clone(),
            })?;

        let mut state = self.lock();
        state.claim_attempts.push(cand.id);
        if state.lost_claims.contains(&cand.id) {
            return Ok(None);
        }
        let Some(job) = state.jobs.iter_mut().find(|j| {
            j.id == cand.id
                && j.status == JobStatus::Pending
                && j.lock_version == cand.lock_version
        }) else {
            return Ok(None);
        };
        job.status = JobStatus::Running;
        job.lock_version += 1;
        Ok(Some(JobClaim {
            job_id: job.id,
            experiment_id: job.experiment_id,
            battery,
            lock_version: job.lock_version,
        }))
    }

    async fn mark_experiment_running(&self, experiment_id: i64) -> Result<(), DbError> {
        let mut state = self.lock();
        if let Some(exp) = state
            .experiments
            .iter_mut()
            .find(|e| e.id == experiment_id && e.status == FakeExperimentStatus::Pending)
        {
            exp.status = FakeExperimentStatus::Running;
        }
        Ok(())
    }

    async fn heartbeat(&self, job_id: i64) -> Result<(), DbError> {
        self.lock().heartbeats.push(job_id);
        Ok(())
    }

    async fn finish(&self, claim: &JobClaim) -> Result<bool, DbError> {
        let mut state = self.lock();
        let Some(job) = state.jobs.iter_mut().find(|j| {
            j.id == claim.job_id
                && j.status == JobStatus::Running
                && j.lock_version == claim.lock_version
        }) else {
            return Ok(false);
        };
        job.status = JobStatus::Finished;
        job.lock_version += 1;
        Ok(true)
    }

    async fn stuck_jobs(&self) -> Result<Vec<StuckJob>, DbError> {
        let state = self.lock();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running && j.stuck && j.retries < 10)
            .map(|j| StuckJob {
                id: j.id,
                experiment_id: j.experiment_id,
                battery: j.battery.clone(),
                lock_version: j.lock_version,
                retries: j.retries,
            })
            .collect())
    }

    async fn reset_to_error(&self, stuck: &StuckJob) -> Result<bool, DbError> {
        let mut state = self.lock();
        let Some(job) = state.jobs.iter_mut().find(|j| {
            j.id == stuck.id
                && j.status == JobStatus::Running
                && j.lock_version == stuck.lock_version
        }) else {
            return Ok(false);
        };
        job.status = JobStatus::Error;
        job.retries += 1;
        job.lock_version += 1;
        Ok(true)
    }

    async fn purge_rollup(&self, experiment_id: i64, rollup_name: &str) -> Result<u64, DbError> {
        let mut state = self.lock();
        state
            .purged
            .push((experiment_id, rollup_name.to_string()));
        let mut removed = 0;
        if let Some(exp) = state.experiments.iter_mut().find(|e| e.id == experiment_id) {
            let before = exp.rollups.len();
            exp.rollups.retain(|r| r.name != rollup_name);
            removed = (before - exp.rollups.len()) as u64;
        }
        Ok(removed)
    }

    async fn revive_to_pending(&self, stuck: &StuckJob) -> Result<bool, DbError> {
        let mut state = self.lock();
        let Some(job) = state.jobs.iter_mut().find(|j| {
            j.id == stuck.id
                && j.status == JobStatus::Error
                && j.lock_version == stuck.lock_version + 1
        }) else {
            return Ok(false);
        };
        job.status = JobStatus::Pending;
        job.stuck = false;
        job.lock_version += 1;
        Ok(true)
    }

    async fn job_statuses(&self, experiment_id: i64) -> Result<Vec<JobStatus>, DbError> {
        let state = self.lock();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.experiment_id == experiment_id)
            .map(|j| j.status)
            .collect())
    }

    async fn finish_experiment(&self, experiment_id: i64) -> Result<bool, DbError> {
        let mut state = self.lock();
        let Some(exp) = state
            .experiments
            .iter_mut()
            .find(|e| e.id == experiment_id && e.status == FakeExperimentStatus::Running)
        else {
            return Ok(false);
        };
        exp.status = FakeExperimentStatus::Finished;
        Ok(true)
    }

    async fn experiment_info(&self, experiment_id: i64) -> Result<Option<ExperimentInfo>, DbError> {
        let state = self.lock();
        Ok(state
            .experiments
            .iter()
            .find(|e| e.id == experiment_id)
            .map(|e| e.info.clone()))
    }

    async fn rollups(&self, experiment_id: i64) -> Result<Vec<BatteryRollup>, DbError> {
        let state = self.lock();
        Ok(state
            .experiments
            .iter()
            .find(|e| e.id == experiment_id)
            .map(|e| e.rollups.clone())
            .unwrap_or_default())
    }

    async fn data_file_sha256(&self, experiment_id: i64) -> Result<Option<String>, DbError> {
        let state = self.lock();
        Ok(state
            .experiments
            .iter()
            .find(|e| e.id == experiment_id)
            .and_then(|e| e.info.data_file_sha256.clone()))
    }

    async fn runtime_settings(&self) -> Result<RuntimeSettings, DbError> {
        Ok(self.lock().settings.clone())
    }

    async fn refresh_worker(&self) -> Result<(), DbError> {
        self.lock().refreshes += 1;
        Ok(())
    }

    async fn deactivate_worker(&self) -> Result<(), DbError> {
        self.lock().deactivated = true;
        Ok(())
    }
}

fn candidate(job: &FakeJob) -> JobCandidate {
    JobCandidate {
        id: job.id,
        experiment_id: job.experiment_id,
        battery: job.battery.clone(),
        lock_version: job.lock_version,
    }
}
