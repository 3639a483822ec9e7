// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for the database layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error during {context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("job {job_id} carries unknown battery tag {tag}")]
    UnknownBattery { job_id: i64, tag: String },
}

impl DbError {
    pub fn query(context: &'static str, source: sqlx::Error) -> Self {
        DbError::Query { context, source }
    }

    /// Whether retrying the same statement can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Query { source, .. } => crate::retry::is_transient(source),
            DbError::UnknownBattery { .. } => false,
        }
    }
}
