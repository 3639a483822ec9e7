// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker registry: upsert on start, last-seen refresh, deactivation.

use rtt_core::WorkerType;
use sqlx::MySqlPool;

/// Identity a worker announces to the registry.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub name: Option<String>,
    pub worker_type: WorkerType,
    pub address: Option<String>,
    pub location: Option<String>,
    pub aux: Option<String>,
}

/// Upsert the worker row keyed by `worker_id` and return its `id` key.
///
/// Inserted rows start active; an existing row gets its last-seen timestamp,
/// address, and active flag refreshed.
pub async fn register(pool: &MySqlPool, identity: &WorkerIdentity) -> Result<i64, sqlx::Error> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM workers WHERE worker_id = ?")
        .bind(&identity.worker_id)
        .fetch_optional(pool)
        .await?;

    let id_key = match existing {
        Some((id,)) => id,
        None => {
            sqlx::query(
                "INSERT INTO workers (worker_id, worker_name, worker_type, worker_added, \
                 worker_last_seen, worker_active, worker_address, worker_location, worker_aux) \
                 VALUES (?, ?, ?, NOW(), NOW(), 1, ?, ?, ?)",
            )
            .bind(&identity.worker_id)
            .bind(&identity.name)
            .bind(identity.worker_type.as_str())
            .bind(&identity.address)
            .bind(&identity.location)
            .bind(&identity.aux)
            .execute(pool)
            .await?
            .last_insert_id() as i64
        }
    };

    refresh(pool, id_key, identity.address.as_deref()).await?;
    Ok(id_key)
}

/// Refresh liveness: last-seen timestamp, address, and the active flag.
pub async fn refresh(
    pool: &MySqlPool,
    id_key: i64,
    address: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE workers SET worker_last_seen = NOW(), worker_address = ?, worker_active = 1 \
         WHERE id = ?",
    )
    .bind(address)
    .bind(id_key)
    .execute(pool)
    .await
    .map(|_| ())
}

/// Graceful-exit deactivation (`--deactivate 1`).
pub async fn deactivate(pool: &MySqlPool, id_key: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE workers SET worker_active = 0, worker_last_seen = NOW() WHERE id = ?")
        .bind(id_key)
        .execute(pool)
        .await
        .map(|_| ())
}
