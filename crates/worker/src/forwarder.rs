// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH port-forwarder for workers without direct database reachability.
//!
//! The tunnel is a supervised `ssh -L` child forwarding a random local port
//! to the database's endpoint through the storage host. The key passphrase
//! goes through an askpass helper and never reaches argv or the log.

use crate::error::WorkerError;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use rtt_cache::AskPass;
use rtt_core::StorageSettings;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Budget for the tunnel to become connectable.
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Polling cadence while waiting on the local port.
const CONNECT_POLL: Duration = Duration::from_millis(250);

/// A running tunnel; the database client connects to `127.0.0.1:local_port`.
pub struct SshForwarder {
    child: Child,
    pub local_port: u16,
    _askpass: Option<AskPass>,
}

impl SshForwarder {
    /// Establish the tunnel and wait until the local port accepts.
    pub async fn start(
        storage: &StorageSettings,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<Self, WorkerError> {
        let local_port = reserve_local_port()?;
        let (mut cmd, askpass) = tunnel_command(storage, local_port, remote_host, remote_port);

        tracing::info!(
            local_port,
            remote = %format!("{remote_host}:{remote_port}"),
            via = %storage.host,
            "starting SSH forwarder"
        );
        let child = cmd
            .spawn()
            .map_err(|e| WorkerError::Forwarder(format!("cannot spawn ssh: {e}")))?;

        let mut forwarder = Self {
            child,
            local_port,
            _askpass: askpass,
        };

        if let Err(err) = wait_for_port(local_port, AVAILABILITY_TIMEOUT).await {
            forwarder.shutdown().await;
            return Err(err);
        }
        tracing::info!(local_port, "SSH forwarder ready");
        Ok(forwarder)
    }

    /// Tear the tunnel down: TERM to the recorded pid, then reap.
    pub async fn shutdown(&mut self) {
        if let Some(pid) = self.child.id() {
            tracing::info!(pid, "stopping SSH forwarder");
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        if tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .is_err()
        {
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
    }
}

/// Reserve an ephemeral port by binding port zero and reading the result.
/// The listener is dropped before ssh binds it; the window in between is
/// the same race every port-forwarding setup accepts.
fn reserve_local_port() -> Result<u16, WorkerError> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| WorkerError::Forwarder(format!("cannot reserve local port: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| WorkerError::Forwarder(format!("cannot read reserved port: {e}")))?
        .port();
    Ok(port)
}

/// Build the `ssh -L` invocation.
fn tunnel_command(
    storage: &StorageSettings,
    local_port: u16,
    remote_host: &str,
    remote_port: u16,
) -> (Command, Option<AskPass>) {
    let mut cmd = Command::new("ssh");
    cmd.arg("-i")
        .arg(&storage.credentials.private_key_file)
        .arg("-L")
        .arg(format!("{local_port}:{remote_host}:{remote_port}"))
        .arg("-N")
        .arg("-oLogLevel=error")
        .arg("-oStrictHostKeyChecking=no")
        .arg("-oUserKnownHostsFile=/dev/null")
        .arg("-oConnectTimeout=30")
        .arg("-oExitOnForwardFailure=yes")
        .arg("-p")
        .arg(storage.port.to_string())
        .arg(format!("{}@{}", storage.credentials.username, storage.host));
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let askpass = if storage.credentials.private_key_password.is_empty() {
        cmd.arg("-oBatchMode=yes");
        None
    } else {
        match AskPass::create(&storage.credentials.private_key_password) {
            Ok(askpass) => {
                askpass.apply(&mut cmd);
                Some(askpass)
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot create askpass helper");
                None
            }
        }
    };
    (cmd, askpass)
}

/// Poll the local port until it accepts or the budget runs out.
async fn wait_for_port(port: u16, budget: Duration) -> Result<(), WorkerError> {
    let started = std::time::Instant::now();
    loop {
        match tokio::net::TcpStream::connect(("127.0.0.1", port)).await {
            Ok(_) => return Ok(()),
            Err(_) if started.elapsed() < budget => {
                tokio::time::sleep(CONNECT_POLL).await;
            }
            Err(err) => {
                return Err(WorkerError::Forwarder(format!(
                    "tunnel port {port} not reachable within {budget:?}: {err}"
                )))
            }
        }
    }
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;
