// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rtt-cache: shared artifact cache for co-located workers.
//!
//! Workers on one host share a cache directory. A two-file lock (primary lock
//! plus heartbeat) serializes downloads per artifact and survives holders
//! killed mid-transfer; a `.downloaded` sentinel marks completed downloads so
//! later claimers skip the network entirely.

pub mod askpass;
pub mod fetch;
pub mod hash;
pub mod janitor;
pub mod lock;
pub mod store;

pub use askpass::AskPass;
pub use fetch::{DownloadLimits, DownloadOutcome, LockedDownloader};
pub use hash::sha256_file;
pub use janitor::{clean_cache, clean_logs, remove_scratch, JanitorReport};
pub use lock::{FileLocker, LockError, LockGuard};
pub use store::{ArtifactStore, LocalStore, SshStore, StoreError};

use thiserror::Error;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transfer stalled: no data for {0:?}")]
    Stalled(std::time::Duration),
    #[error("transfer too slow: {rate:.1} B/s after {elapsed:?}")]
    TooSlow {
        rate: f64,
        elapsed: std::time::Duration,
    },
    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: std::path::PathBuf,
        expected: String,
        actual: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
