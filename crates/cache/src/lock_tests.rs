// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rtt_core::paths;
use tempfile::TempDir;

fn artifact(dir: &TempDir) -> PathBuf {
    dir.path().join("7.bin")
}

fn short_locker(dir: &TempDir) -> FileLocker {
    FileLocker::new(&artifact(dir))
        .with_timeouts(Duration::from_millis(400), Duration::from_millis(150))
        .with_poll_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn acquire_creates_lock_and_heartbeat() {
    let dir = TempDir::new().unwrap();
    let locker = short_locker(&dir);

    let guard = locker.acquire().await.unwrap();
    assert!(paths::lock_file(&artifact(&dir)).exists());
    assert!(paths::lock_heartbeat_file(&artifact(&dir)).exists());

    drop(guard);
    assert!(!paths::lock_file(&artifact(&dir)).exists());
    assert!(!paths::lock_heartbeat_file(&artifact(&dir)).exists());
}

#[tokio::test]
async fn held_lock_with_live_heartbeat_blocks_until_timeout() {
    let dir = TempDir::new().unwrap();
    let locker = short_locker(&dir);

    let guard = locker.acquire().await.unwrap();

    // A contender never gets in while the holder keeps touching.
    let contender = short_locker(&dir);
    let heartbeat = async {
        loop {
            guard.touch();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
    };
    tokio::select! {
        _ = heartbeat => {}
        result = contender.acquire() => {
            assert!(matches!(result, Err(LockError::Timeout(_))));
        }
    }
}

#[tokio::test]
async fn stale_heartbeat_is_reclaimed() {
    let dir = TempDir::new().unwrap();
    let path = artifact(&dir);

    // Simulate a holder that died mid-transfer: lock file present, heartbeat
    // never touched again.
    std::fs::write(paths::lock_file(&path), b"1234").unwrap();
    std::fs::write(paths::lock_heartbeat_file(&path), b"").unwrap();

    let locker = FileLocker::new(&path)
        .with_timeouts(Duration::from_secs(2), Duration::from_millis(100))
        .with_poll_interval(Duration::from_millis(20));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let guard = locker.acquire().await.unwrap();
    drop(guard);
}

#[tokio::test]
async fn missing_heartbeat_counts_as_expired() {
    let dir = TempDir::new().unwrap();
    let path = artifact(&dir);

    // Lock file without any heartbeat: the holder never proved liveness.
    std::fs::write(paths::lock_file(&path), b"1234").unwrap();

    let locker = FileLocker::new(&path)
        .with_timeouts(Duration::from_secs(2), Duration::from_millis(100))
        .with_poll_interval(Duration::from_millis(20));

    let guard = locker.acquire().await.unwrap();
    drop(guard);
}

#[tokio::test]
async fn sequential_acquire_release_cycles() {
    let dir = TempDir::new().unwrap();
    let locker = short_locker(&dir);

    for _ in 0..3 {
        let guard = locker.acquire().await.unwrap();
        guard.touch();
        drop(guard);
    }
}
