// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact path naming shared by the fetcher, the supervisor, and the
//! janitor. The store and the local cache use the same file names.

use std::path::{Path, PathBuf};

/// `{dir}/{experiment_id}.bin`
pub fn data_file(dir: &Path, experiment_id: i64) -> PathBuf {
    dir.join(format!("{experiment_id}.bin"))
}

/// `{dir}/{experiment_id}.json`
pub fn config_file(dir: &Path, experiment_id: i64) -> PathBuf {
    dir.join(format!("{experiment_id}.json"))
}

/// Primary lock file guarding a cached artifact.
pub fn lock_file(path: &Path) -> PathBuf {
    sibling(path, ".lock")
}

/// Heartbeat file proving the lock holder is alive.
pub fn lock_heartbeat_file(path: &Path) -> PathBuf {
    sibling(path, ".lock.2")
}

/// Sentinel whose existence asserts a completed download.
pub fn sentinel_file(path: &Path) -> PathBuf {
    sibling(path, ".downloaded")
}

/// All bookkeeping siblings of a cached artifact, for cleanup.
pub fn associated_files(path: &Path) -> [PathBuf; 3] {
    [
        lock_file(path),
        lock_heartbeat_file(path),
        sentinel_file(path),
    ]
}

/// Per-worker scratch directory, removed on shutdown.
pub fn scratch_dir(base: &Path, worker_id: &str) -> PathBuf {
    base.join("worker-scratch").join(worker_id)
}

/// Parse the experiment id out of a cached `{id}.bin` file name.
pub fn experiment_id_from_data_file(path: &Path) -> Option<i64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".bin")?;
    stem.parse().ok()
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
