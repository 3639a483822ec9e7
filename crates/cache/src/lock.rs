// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-file artifact lock with liveness.
//!
//! The primary lock file is taken with create-exclusive semantics; a separate
//! heartbeat file's modification time proves the holder is alive. A lock
//! whose heartbeat is older than the expiry window is forcibly released and
//! retaken, so a downloader killed with the lock held cannot starve its
//! peers. A plain advisory lock cannot provide this recovery.

use rtt_core::paths;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Default acquisition budget (eight hours: long transfers ahead of us).
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(8 * 3600);

/// Heartbeat age at which a held lock counts as abandoned.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(120);

/// Cadence at which lock holders should touch the heartbeat.
pub const TOUCH_INTERVAL: Duration = Duration::from_secs(2);

/// Polling cadence while waiting on a held lock.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Forced reclamations allowed within a single acquire attempt chain.
const MAX_RECLAIMS: u32 = 2;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out acquiring lock {0}")]
    Timeout(PathBuf),
    #[error("i/o error on lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lock factory for one artifact path.
#[derive(Debug, Clone)]
pub struct FileLocker {
    lock_path: PathBuf,
    heartbeat_path: PathBuf,
    acquire_timeout: Duration,
    expiry: Duration,
    poll_interval: Duration,
}

impl FileLocker {
    /// Locker for the given artifact with default timeouts.
    pub fn new(artifact: &std::path::Path) -> Self {
        Self {
            lock_path: paths::lock_file(artifact),
            heartbeat_path: paths::lock_heartbeat_file(artifact),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            expiry: DEFAULT_EXPIRY,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override timeouts (tests and special deployments).
    pub fn with_timeouts(mut self, acquire_timeout: Duration, expiry: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self.expiry = expiry;
        self
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Acquire the lock, force-releasing abandoned holders.
    pub async fn acquire(&self) -> Result<LockGuard, LockError> {
        let started = std::time::Instant::now();
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            if started.elapsed() >= self.acquire_timeout {
                return Err(LockError::Timeout(self.lock_path.clone()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One acquisition round: take the lock, or reclaim it when the holder's
    /// heartbeat has expired.
    fn try_acquire(&self) -> Result<Option<LockGuard>, LockError> {
        for reclaim in 0..=MAX_RECLAIMS {
            match self.create_exclusive() {
                Ok(()) => {
                    let guard = LockGuard {
                        lock_path: self.lock_path.clone(),
                        heartbeat_path: self.heartbeat_path.clone(),
                    };
                    guard.touch();
                    return Ok(Some(guard));
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !self.heartbeat_expired() {
                        return Ok(None);
                    }
                    tracing::warn!(
                        lock = %self.lock_path.display(),
                        reclaim,
                        "lock heartbeat expired, force-releasing abandoned lock"
                    );
                    let _ = fs::remove_file(&self.lock_path);
                }
                Err(source) => {
                    return Err(LockError::Io {
                        path: self.lock_path.clone(),
                        source,
                    })
                }
            }
        }
        Ok(None)
    }

    fn create_exclusive(&self) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)?;
        // Holder pid, for operators inspecting a wedged cache.
        let _ = write!(file, "{}", std::process::id());
        Ok(())
    }

    /// A missing heartbeat counts as expired: the holder never proved life.
    fn heartbeat_expired(&self) -> bool {
        let mtime = fs::metadata(&self.heartbeat_path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        match SystemTime::now().duration_since(mtime) {
            Ok(age) => age > self.expiry,
            Err(_) => false,
        }
    }
}

/// A held artifact lock. Released on drop; `touch` keeps it alive.
#[derive(Debug)]
pub struct LockGuard {
    lock_path: PathBuf,
    heartbeat_path: PathBuf,
}

impl LockGuard {
    /// Refresh the heartbeat file's modification time.
    pub fn touch(&self) {
        if let Err(err) = fs::write(&self.heartbeat_path, b"") {
            tracing::warn!(
                heartbeat = %self.heartbeat_path.display(),
                error = %err,
                "failed to touch lock heartbeat"
            );
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.heartbeat_path);
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
