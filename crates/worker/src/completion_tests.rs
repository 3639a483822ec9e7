// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::board::fake::{FakeBoard, FakeExperimentStatus, FakeJob};
use crate::mailer::NotifyError;
use async_trait::async_trait;
use rtt_core::Battery;
use rtt_db::{BatteryRollup, ExperimentInfo};
use std::sync::Mutex;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(i64, usize)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn experiment_finished(
        &self,
        info: &ExperimentInfo,
        rollups: &[BatteryRollup],
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((info.id, rollups.len()));
        Ok(())
    }
}

fn running_job(id: i64, experiment_id: i64, battery: &str) -> FakeJob {
    FakeJob {
        id,
        experiment_id,
        battery: battery.to_string(),
        status: JobStatus::Running,
        lock_version: 1,
        retries: 0,
        stuck: false,
    }
}

fn claim_of(id: i64, experiment_id: i64, battery: Battery) -> JobClaim {
    JobClaim {
        job_id: id,
        experiment_id,
        battery,
        lock_version: 1,
    }
}

#[yare::parameterized(
    empty        = { &[], false },
    all_finished = { &[JobStatus::Finished, JobStatus::Finished], true },
    with_error   = { &[JobStatus::Finished, JobStatus::Error], true },
    one_running  = { &[JobStatus::Finished, JobStatus::Running], false },
    one_pending  = { &[JobStatus::Pending], false },
)]
fn completion_predicate(statuses: &[JobStatus], expected: bool) {
    assert_eq!(experiment_complete(statuses), expected);
}

#[tokio::test]
async fn last_job_finishes_experiment_and_mails_author() {
    let board = FakeBoard::new()
        .with_experiment(42, FakeExperimentStatus::Running)
        .push_job(running_job(1, 42, "nist_sts"))
        .push_job(FakeJob {
            status: JobStatus::Finished,
            ..running_job(2, 42, "dieharder")
        });
    {
        let mut state = board.lock();
        state.experiments[0].info.author_email = Some("author@example.org".to_string());
        state.experiments[0].rollups = vec![
            BatteryRollup {
                name: "Dieharder".to_string(),
                passed_tests: 1,
                total_tests: 2,
            },
            BatteryRollup {
                name: "NIST Statistical Testing Suite".to_string(),
                passed_tests: 3,
                total_tests: 3,
            },
        ];
    }
    let notifier = RecordingNotifier::default();

    finalize_job(&board, &notifier, &claim_of(1, 42, Battery::NistSts))
        .await
        .unwrap();

    let state = board.lock();
    assert_eq!(state.jobs[0].status, JobStatus::Finished);
    assert_eq!(
        state.experiments[0].status,
        FakeExperimentStatus::Finished
    );
    assert_eq!(*notifier.sent.lock().unwrap(), vec![(42, 2)]);
}

#[tokio::test]
async fn incomplete_experiment_is_left_running() {
    let board = FakeBoard::new()
        .with_experiment(42, FakeExperimentStatus::Running)
        .push_job(running_job(1, 42, "nist_sts"))
        .push_job(FakeJob {
            status: JobStatus::Pending,
            ..running_job(2, 42, "dieharder")
        });
    let notifier = RecordingNotifier::default();

    finalize_job(&board, &notifier, &claim_of(1, 42, Battery::NistSts))
        .await
        .unwrap();

    let state = board.lock();
    assert_eq!(state.experiments[0].status, FakeExperimentStatus::Running);
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn lost_finish_cas_changes_nothing() {
    // The reaper reset the job while we ran: lock_version moved on.
    let board = FakeBoard::new()
        .with_experiment(42, FakeExperimentStatus::Running)
        .push_job(FakeJob {
            lock_version: 5,
            ..running_job(1, 42, "nist_sts")
        });
    let notifier = RecordingNotifier::default();

    finalize_job(&board, &notifier, &claim_of(1, 42, Battery::NistSts))
        .await
        .unwrap();

    let state = board.lock();
    assert_eq!(state.jobs[0].status, JobStatus::Running);
    assert_eq!(state.experiments[0].status, FakeExperimentStatus::Running);
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_finalization_sends_one_mail() {
    let board = FakeBoard::new()
        .with_experiment(42, FakeExperimentStatus::Running)
        .push_job(running_job(1, 42, "nist_sts"));
    {
        let mut state = board.lock();
        state.experiments[0].info.author_email = Some("author@example.org".to_string());
    }
    let notifier = RecordingNotifier::default();
    let claim = claim_of(1, 42, Battery::NistSts);

    finalize_job(&board, &notifier, &claim).await.unwrap();
    // Replay: the finish CAS no-ops and the experiment transition is lost.
    finalize_job(&board, &notifier, &claim).await.unwrap();

    assert_eq!(notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn authorless_experiments_send_no_mail() {
    let board = FakeBoard::new()
        .with_experiment(42, FakeExperimentStatus::Running)
        .push_job(running_job(1, 42, "nist_sts"));
    let notifier = RecordingNotifier::default();

    finalize_job(&board, &notifier, &claim_of(1, 42, Battery::NistSts))
        .await
        .unwrap();

    let state = board.lock();
    assert_eq!(
        state.experiments[0].status,
        FakeExperimentStatus::Finished
    );
    assert!(notifier.sent.lock().unwrap().is_empty());
}
