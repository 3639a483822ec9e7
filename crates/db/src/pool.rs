// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection pool construction.

use crate::error::DbError;
use rtt_core::DatabaseSettings;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;

/// Resolved connection parameters. The endpoint may differ from the
/// configured one when an SSH forwarder is interposed.
#[derive(Debug, Clone)]
pub struct DbParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbParams {
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            database: settings.name.clone(),
            username: settings.credentials.username.clone(),
            password: settings.credentials.password.clone(),
        }
    }

    /// Redirect to a different endpoint (CLI override or forwarded port).
    pub fn with_endpoint(mut self, host: Option<&str>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host.to_string();
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }
}

/// Connect a small pool. One worker runs one job at a time, so a handful of
/// connections covers the loop plus the heartbeat task.
pub async fn connect(params: &DbParams) -> Result<MySqlPool, DbError> {
    let options = MySqlConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .database(&params.database)
        .username(&params.username)
        .password(&params.password);

    MySqlPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await
        .map_err(|source| DbError::query("connect", source))
}
