// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed view over the `rtt_settings` key/value table.
//!
//! Operators flip these rows to pause worker classes, retire old workers, or
//! tune the reaper without redeploying anything. Workers re-read them every
//! loop iteration, so a fresh [`RuntimeSettings`] is cheap and short-lived.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Epoch seconds until which short-term workers pause.
pub const SHORTTERM_DISABLE: &str = "shortterm-disable";
/// Epoch seconds until which long-term workers pause.
pub const LONGTERM_DISABLE: &str = "longterm-disable";
/// Workers started before this epoch must self-exit.
pub const TERMINATE_OLDER: &str = "terminate-older";
/// Seconds between reaper passes.
pub const CLEANUP_INTERVAL: &str = "cleanup-interval";
/// Fleet-size hint used to size candidate pools.
pub const NUM_WORKERS: &str = "num-workers";

/// Default reaper cadence when `cleanup-interval` is unset.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
/// Default fleet-size hint when `num-workers` is unset.
pub const DEFAULT_NUM_WORKERS: usize = 10;

/// Operator-declared worker class, used by the global pause switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerType {
    Shortterm,
    Longterm,
}

impl WorkerType {
    /// The value stored in `workers.worker_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerType::Shortterm => "shortterm",
            WorkerType::Longterm => "longterm",
        }
    }

    /// The pause-switch settings key governing this class.
    pub fn disable_key(&self) -> &'static str {
        match self {
            WorkerType::Shortterm => SHORTTERM_DISABLE,
            WorkerType::Longterm => LONGTERM_DISABLE,
        }
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of the `rtt_settings` rows.
#[derive(Debug, Clone, Default)]
pub struct RuntimeSettings {
    values: HashMap<String, String>,
}

impl RuntimeSettings {
    pub fn from_rows(rows: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            values: rows.into_iter().collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn epoch(&self, key: &str) -> Option<i64> {
        self.get(key)?.trim().parse().ok()
    }

    /// Pause deadline for a worker class, if one is set and still in the future.
    pub fn disabled_until(&self, worker_type: WorkerType, now: DateTime<Utc>) -> Option<i64> {
        let until = self.epoch(worker_type.disable_key())?;
        (until > now.timestamp()).then_some(until)
    }

    /// True when the given start time predates the `terminate-older` cutoff.
    pub fn should_terminate(&self, started: DateTime<Utc>) -> bool {
        match self.epoch(TERMINATE_OLDER) {
            Some(cutoff) => started.timestamp() < cutoff,
            None => false,
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.get(CLEANUP_INTERVAL)
            .and_then(|v| v.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL)
    }

    pub fn num_workers(&self) -> usize {
        self.get(NUM_WORKERS)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_NUM_WORKERS)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
