// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the worker runtime.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Config(#[from] rtt_core::ConfigError),
    #[error(transparent)]
    Db(#[from] rtt_db::DbError),
    #[error(transparent)]
    Cache(#[from] rtt_cache::CacheError),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("runner failed to start: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("ssh forwarder: {0}")]
    Forwarder(String),
}

impl WorkerError {
    pub(crate) fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        WorkerError::Io {
            path: path.into(),
            source,
        }
    }
}
