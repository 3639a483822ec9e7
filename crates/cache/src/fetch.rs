// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutually exclusive, resumable artifact download.
//!
//! The `.downloaded` sentinel exists if and only if a previous download
//! completed. Failures leave the sentinel absent so the next claimer retries;
//! successes let every later claimer return without touching the network.

use crate::hash::sha256_file;
use crate::lock::{FileLocker, TOUCH_INTERVAL};
use crate::store::ArtifactStore;
use crate::CacheError;
use rtt_core::paths;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Abort thresholds for a transfer in progress.
#[derive(Debug, Clone)]
pub struct DownloadLimits {
    /// Minimum acceptable average throughput, in bytes per second.
    pub min_throughput: f64,
    /// Transfer time before the throughput floor is enforced.
    pub throughput_grace: Duration,
    /// Abort when no bytes arrive for this long.
    pub stall_timeout: Duration,
    /// Lock-heartbeat touch cadence while transferring.
    pub touch_interval: Duration,
}

impl Default for DownloadLimits {
    fn default() -> Self {
        Self {
            min_throughput: 1024.0,
            throughput_grace: Duration::from_secs(60),
            stall_timeout: Duration::from_secs(30),
            touch_interval: TOUCH_INTERVAL,
        }
    }
}

/// Result of a download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Sentinel and artifact were already present; no transfer happened.
    AlreadyCached,
    /// A transfer ran to completion.
    Downloaded { bytes: u64 },
}

/// Downloads one artifact under the two-file lock.
pub struct LockedDownloader {
    dest: PathBuf,
    locker: FileLocker,
    limits: DownloadLimits,
}

impl LockedDownloader {
    pub fn new(dest: &Path) -> Self {
        Self {
            dest: dest.to_path_buf(),
            locker: FileLocker::new(dest),
            limits: DownloadLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DownloadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_locker(mut self, locker: FileLocker) -> Self {
        self.locker = locker;
        self
    }

    /// Fetch `remote` into the destination. With `force` the cached copy is
    /// refreshed even when the sentinel is present. When `expected_sha256`
    /// is known the downloaded bytes are verified before the sentinel is
    /// written, so the sentinel keeps implying a byte-exact copy.
    pub async fn download<S: ArtifactStore>(
        &self,
        store: &S,
        remote: &Path,
        force: bool,
        expected_sha256: Option<&str>,
    ) -> Result<DownloadOutcome, CacheError> {
        let guard = self.locker.acquire().await?;
        let sentinel = paths::sentinel_file(&self.dest);

        if !force && self.dest.exists() && sentinel.exists() {
            tracing::debug!(dest = %self.dest.display(), "artifact already cached");
            return Ok(DownloadOutcome::AlreadyCached);
        }

        if sentinel.exists() {
            std::fs::remove_file(&sentinel).map_err(|e| CacheError::io(&sentinel, e))?;
        }

        tracing::info!(
            remote = %remote.display(),
            dest = %self.dest.display(),
            force,
            "downloading artifact"
        );

        let mut reader = store.open(remote).await?;
        let mut file = tokio::fs::File::create(&self.dest)
            .await
            .map_err(|e| CacheError::io(&self.dest, e))?;

        let started = Instant::now();
        let mut last_touch = Instant::now();
        let mut bytes: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let read = tokio::time::timeout(self.limits.stall_timeout, reader.read(&mut buf))
                .await
                .map_err(|_| CacheError::Stalled(self.limits.stall_timeout))?
                .map_err(|e| CacheError::io(remote, e))?;
            if read == 0 {
                break;
            }

            file.write_all(&buf[..read])
                .await
                .map_err(|e| CacheError::io(&self.dest, e))?;
            bytes += read as u64;

            if last_touch.elapsed() >= self.limits.touch_interval {
                guard.touch();
                last_touch = Instant::now();
            }

            let elapsed = started.elapsed();
            if elapsed > self.limits.throughput_grace {
                let rate = bytes as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
                if rate < self.limits.min_throughput {
                    return Err(CacheError::TooSlow { rate, elapsed });
                }
            }
        }

        file.flush().await.map_err(|e| CacheError::io(&self.dest, e))?;
        drop(file);
        store.close(reader).await?;

        if let Some(expected) = expected_sha256 {
            let actual = sha256_file(&self.dest)
                .await
                .map_err(|e| CacheError::io(&self.dest, e))?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(CacheError::DigestMismatch {
                    path: self.dest.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        std::fs::File::create(&sentinel).map_err(|e| CacheError::io(&sentinel, e))?;
        tracing::info!(dest = %self.dest.display(), bytes, "download complete");
        Ok(DownloadOutcome::Downloaded { bytes })
    }
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
