// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::board::fake::{FakeBoard, FakeExperimentStatus};
use crate::mailer::{Notifier, NotifyError};
use crate::shutdown;
use async_trait::async_trait;
use rtt_cache::LocalStore;
use rtt_core::settings::TERMINATE_OLDER;
use rtt_core::RuntimeSettings;
use rtt_db::{BatteryRollup, ExperimentInfo, JobStatus};
use std::os::unix::fs::PermissionsExt;
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<i64>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn experiment_finished(
        &self,
        info: &ExperimentInfo,
        _rollups: &[BatteryRollup],
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(info.id);
        Ok(())
    }
}

struct Rig {
    root: TempDir,
}

impl Rig {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        for dir in [
            "cache-data",
            "cache-config",
            "storage-data",
            "storage-config",
        ] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        let binary = root.path().join("rtt");
        std::fs::write(&binary, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { root }
    }

    fn seed_experiment(&self, experiment_id: i64) {
        std::fs::write(
            self.root
                .path()
                .join("storage-data")
                .join(format!("{experiment_id}.bin")),
            vec![0u8; 64],
        )
        .unwrap();
        std::fs::write(
            self.root
                .path()
                .join("storage-config")
                .join(format!("{experiment_id}.json")),
            b"{}",
        )
        .unwrap();
    }

    fn worker(
        &self,
        board: FakeBoard,
        options: WorkerOptions,
    ) -> (
        Worker<FakeBoard, RecordingNotifier, LocalStore>,
        shutdown::ShutdownHandle,
    ) {
        let (handle, shut) = shutdown::channel();
        let fetcher = ArtifactFetcher::new(
            LocalStore,
            self.root.path().join("cache-data"),
            self.root.path().join("cache-config"),
            self.root.path().join("storage-data"),
            self.root.path().join("storage-config"),
        );
        let runner = RunnerContext {
            rtt_binary: self.root.path().join("rtt"),
            booltest_binary: self.root.path().join("rtt"),
            max_sec_per_test: 30,
            settings_json: None,
            db_endpoint: None,
            scratch_dir: None,
        };
        let worker = Worker::new(
            board,
            RecordingNotifier::default(),
            fetcher,
            runner,
            shut,
            options,
            self.root.path().join("cache-data"),
        )
        .with_sleeps(Duration::from_millis(20), Duration::from_millis(20));
        (worker, handle)
    }
}

fn options() -> WorkerOptions {
    WorkerOptions {
        run_time: None,
        all_time: false,
        worker_type: WorkerType::Shortterm,
        max_sec_per_test: 30,
    }
}

#[tokio::test]
async fn empty_backlog_exits_cleanly() {
    let rig = Rig::new();
    let (worker, _handle) = rig.worker(FakeBoard::new(), options());

    let reason = worker.run().await.unwrap();
    assert_eq!(reason, ExitReason::NoPendingJobs);
    assert!(worker.board().lock().refreshes >= 1);
}

#[tokio::test]
async fn signal_before_loop_exits_immediately() {
    let rig = Rig::new();
    let (worker, handle) = rig.worker(FakeBoard::new(), options());
    handle.request();

    let reason = worker.run().await.unwrap();
    assert_eq!(reason, ExitReason::Signal);
}

#[tokio::test]
async fn terminate_older_retires_the_worker() {
    let rig = Rig::new();
    let board = FakeBoard::new();
    {
        let far_future = chrono::Utc::now().timestamp() + 3600;
        board.lock().settings = RuntimeSettings::from_rows([(
            TERMINATE_OLDER.to_string(),
            far_future.to_string(),
        )]);
    }
    let (worker, _handle) = rig.worker(board, options());

    let reason = worker.run().await.unwrap();
    assert_eq!(reason, ExitReason::TerminateOlder);
}

#[tokio::test]
async fn exhausted_time_budget_exits_before_claiming() {
    let rig = Rig::new();
    let board = FakeBoard::new().with_job(1, 5, "dieharder");
    let (worker, _handle) = rig.worker(
        board,
        WorkerOptions {
            run_time: Some(Duration::from_secs(1)),
            ..options()
        },
    );

    let reason = worker.run().await.unwrap();
    assert_eq!(reason, ExitReason::TimeBudget);
    // The job was never claimed.
    assert_eq!(worker.board().lock().jobs[0].status, JobStatus::Pending);
}

#[tokio::test]
async fn paused_class_sleeps_instead_of_exiting() {
    let rig = Rig::new();
    let board = FakeBoard::new();
    {
        let until = chrono::Utc::now().timestamp() + 3600;
        board.lock().settings = RuntimeSettings::from_rows([(
            "shortterm-disable".to_string(),
            until.to_string(),
        )]);
    }
    let (worker, handle) = rig.worker(board, options());

    let run = tokio::spawn(async move { worker.run().await });
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.request();

    let reason = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, ExitReason::Signal);
}

#[tokio::test]
async fn single_worker_happy_path_finishes_experiment() {
    let rig = Rig::new();
    rig.seed_experiment(42);

    let board = FakeBoard::new()
        .with_experiment(42, FakeExperimentStatus::Pending)
        .with_job(1, 42, "nist_sts")
        .with_job(2, 42, "dieharder");
    {
        let mut state = board.lock();
        state.experiments[0].info.author_email = Some("author@example.org".to_string());
    }

    let (worker, _handle) = rig.worker(board, options());
    let reason = worker.run().await.unwrap();

    assert_eq!(reason, ExitReason::NoPendingJobs);
    let state = worker.board().lock();
    assert!(state
        .jobs
        .iter()
        .all(|j| j.status == JobStatus::Finished));
    assert_eq!(
        state.experiments[0].status,
        FakeExperimentStatus::Finished
    );
    // Artifacts were cached once and reused for the second job.
    assert!(rig.root.path().join("cache-data/42.bin").exists());
    assert!(rig.root.path().join("cache-config/42.json").exists());
}
