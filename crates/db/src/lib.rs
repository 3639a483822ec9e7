// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rtt-db: MySQL access layer for the worker fleet.
//!
//! The database is the fleet's only coordination point. Every mutation on the
//! hot path is either a compare-and-swap guarded by `jobs.lock_version` or an
//! idempotent status-guarded UPDATE; readers tolerate stale rows because the
//! CAS rejects them at claim time.

pub mod error;
pub mod experiments;
pub mod jobs;
pub mod models;
pub mod pool;
pub mod retry;
pub mod settings;
pub mod workers;

pub use error::DbError;
pub use models::{
    BatteryRollup, ExperimentInfo, ExperimentStatus, JobCandidate, JobClaim, JobStatus, StuckJob,
};
pub use pool::{connect, DbParams};
pub use retry::with_retries;
pub use workers::WorkerIdentity;
