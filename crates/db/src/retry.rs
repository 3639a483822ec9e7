// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transient-error classification and jittered back-off.
//!
//! Lock-wait timeouts and deadlock victims are a normal cost of running many
//! workers against the same tables; they are retried in place. Anything else
//! propagates to the caller.

use crate::error::DbError;
use rand::Rng;
use sqlx::mysql::MySqlDatabaseError;
use std::future::Future;
use std::time::Duration;

/// MySQL error numbers treated as transient: lock wait timeout, deadlock.
const TRANSIENT_MYSQL_CODES: [u16; 2] = [1205, 1213];

/// Attempts before a transient error is given up on.
const MAX_ATTEMPTS: u32 = 6;

/// Base delay for the exponential back-off.
const BASE_DELAY: Duration = Duration::from_millis(250);

/// Upper bound on a single back-off sleep.
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Classify by MySQL error number or message substring.
///
/// Some drivers surface lock conflicts without a usable number, so the
/// message substrings the server emits are matched as a fallback.
pub(crate) fn transient_number_or_message(number: Option<u16>, message: &str) -> bool {
    if let Some(number) = number {
        if TRANSIENT_MYSQL_CODES.contains(&number) {
            return true;
        }
    }
    message.contains("Deadlock found") || message.contains("Lock wait timeout exceeded")
}

/// Whether an sqlx error is worth retrying in place.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let number = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(MySqlDatabaseError::number);
            transient_number_or_message(number, db.message())
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Jittered exponential back-off delay for the given zero-based attempt.
pub(crate) fn backoff_delay(attempt: u32, rng: &mut impl Rng) -> Duration {
    let exp = BASE_DELAY.saturating_mul(1u32 << attempt.min(8));
    let capped = exp.min(MAX_DELAY);
    // Uniform jitter in [50%, 100%] of the capped delay avoids herd retries.
    capped.mul_f64(rng.random_range(0.5..=1.0))
}

/// Run `op` until it succeeds, retrying transient database errors with
/// jittered back-off. Non-transient errors propagate immediately.
pub async fn with_retries<T, F, Fut>(context: &'static str, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt + 1 < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt, &mut rand::rng());
                tracing::warn!(
                    context,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient database error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(DbError::query(context, err)),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
