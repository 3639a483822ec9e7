// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job finalization and experiment completion.
//!
//! The finish CAS is a no-op when the job moved under us (the reaper may
//! have reset it meanwhile), and only the winner of the experiment's
//! `running -> finished` transition sends mail, so repeated invocations are
//! harmless.

use crate::board::JobBoard;
use crate::error::WorkerError;
use crate::mailer::Notifier;
use rtt_db::{JobClaim, JobStatus};

/// An experiment is complete once every one of its jobs has settled.
pub fn experiment_complete(statuses: &[JobStatus]) -> bool {
    !statuses.is_empty() && statuses.iter().all(JobStatus::is_settled)
}

/// Mark the claimed job finished; when that completed the experiment, roll
/// it up and notify the author.
pub async fn finalize_job<B: JobBoard, N: Notifier>(
    board: &B,
    notifier: &N,
    claim: &JobClaim,
) -> Result<(), WorkerError> {
    if !board.finish(claim).await? {
        tracing::warn!(
            job_id = claim.job_id,
            "finish CAS lost: job was reset while we ran, leaving it alone"
        );
        return Ok(());
    }
    tracing::info!(job_id = claim.job_id, "job finished");

    let statuses = board.job_statuses(claim.experiment_id).await?;
    if !experiment_complete(&statuses) {
        return Ok(());
    }

    if !board.finish_experiment(claim.experiment_id).await? {
        // Another worker won the transition and owns the notification.
        return Ok(());
    }
    tracing::info!(experiment_id = claim.experiment_id, "experiment finished");

    let Some(info) = board.experiment_info(claim.experiment_id).await? else {
        tracing::error!(
            experiment_id = claim.experiment_id,
            "finished experiment has no row"
        );
        return Ok(());
    };
    if info.author_email.is_none() {
        return Ok(());
    }

    let rollups = board.rollups(claim.experiment_id).await?;
    if let Err(err) = notifier.experiment_finished(&info, &rollups).await {
        // Mail is best-effort; the experiment stays finished.
        tracing::error!(
            experiment_id = claim.experiment_id,
            error = %err,
            "completion mail failed"
        );
    }
    Ok(())
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;
