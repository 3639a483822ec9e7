// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime knobs from the `rtt_settings` table.

use rtt_core::RuntimeSettings;
use sqlx::MySqlPool;

/// Fetch a fresh snapshot of every setting row.
pub async fn runtime_settings(pool: &MySqlPool) -> Result<RuntimeSettings, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT name, value FROM rtt_settings")
        .fetch_all(pool)
        .await?;
    Ok(RuntimeSettings::from_rows(rows))
}
