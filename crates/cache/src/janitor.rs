// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache and log cleanup.
//!
//! Artifacts are only removed once their experiment is finished; files
//! without a matching experiment must stay, since jobs may be created for
//! them later. Log files expire by age alone.

use rtt_core::paths;
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Log files older than this are deleted.
pub const LOG_EXPIRY: Duration = Duration::from_secs(24 * 3600);

/// What a janitor pass removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JanitorReport {
    pub experiments_removed: usize,
    pub files_removed: usize,
}

/// Experiment ids with a cached data file, parsed from `{id}.bin` names.
pub fn cached_experiment_ids(data_dir: &Path) -> std::io::Result<Vec<i64>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if let Some(id) = paths::experiment_id_from_data_file(&entry.path()) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Remove artifacts of every finished experiment found in the cache.
pub fn clean_cache(
    data_dir: &Path,
    config_dir: &Path,
    finished: &HashSet<i64>,
) -> std::io::Result<JanitorReport> {
    let mut report = JanitorReport::default();
    for id in cached_experiment_ids(data_dir)? {
        if !finished.contains(&id) {
            continue;
        }
        tracing::info!(experiment_id = id, "removing cached artifacts of finished experiment");
        report.files_removed += remove_artifact(&paths::data_file(data_dir, id));
        report.files_removed += remove_artifact(&paths::config_file(config_dir, id));
        report.experiments_removed += 1;
    }
    Ok(report)
}

/// Remove one artifact and its lock/sentinel siblings. Returns how many
/// files actually disappeared.
fn remove_artifact(path: &Path) -> usize {
    let mut removed = 0;
    if std::fs::remove_file(path).is_ok() {
        removed += 1;
    }
    for sibling in paths::associated_files(path) {
        if std::fs::remove_file(&sibling).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Walk the log directory tree and delete files older than `expiry`.
/// Returns (files removed, bytes reclaimed).
pub fn clean_logs(log_dir: &Path, expiry: Duration) -> (usize, u64) {
    let mut removed = 0;
    let mut bytes = 0;
    let now = SystemTime::now();
    clean_logs_walk(log_dir, expiry, now, &mut removed, &mut bytes);
    (removed, bytes)
}

fn clean_logs_walk(
    dir: &Path,
    expiry: Duration,
    now: SystemTime,
    removed: &mut usize,
    bytes: &mut u64,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "cannot read log directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            clean_logs_walk(&path, expiry, now, removed, bytes);
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let age = meta
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok());
        if age.is_some_and(|age| age > expiry) && std::fs::remove_file(&path).is_ok() {
            *removed += 1;
            *bytes += meta.len();
        }
    }
}

/// Remove a per-worker scratch directory. Best-effort.
pub fn remove_scratch(dir: &Path) {
    if let Err(err) = std::fs::remove_dir_all(dir) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %err, "failed to remove scratch directory");
        }
    }
}

#[cfg(test)]
#[path = "janitor_tests.rs"]
mod tests;
