// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact store transports.
//!
//! The store holds `{id}.bin` / `{id}.json` under well-known directories and
//! is reached over SSH: a fetch streams `ssh … cat <remote>` child stdout.
//! `LocalStore` serves same-host deployments and the test suite.

use crate::askpass::AskPass;
use async_trait::async_trait;
use rtt_core::SshCredentials;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transfer of {path} failed: {detail}")]
    Transfer { path: PathBuf, detail: String },
}

/// A source of remote artifacts, streamed in chunks.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    type Reader: AsyncRead + Send + Unpin;

    /// Open a remote artifact for reading.
    async fn open(&self, remote: &Path) -> Result<Self::Reader, StoreError>;

    /// Finish a transfer, surfacing errors the stream could not report.
    async fn close(&self, reader: Self::Reader) -> Result<(), StoreError>;
}

/// Store reached through the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalStore;

#[async_trait]
impl ArtifactStore for LocalStore {
    type Reader = tokio::fs::File;

    async fn open(&self, remote: &Path) -> Result<Self::Reader, StoreError> {
        tokio::fs::File::open(remote)
            .await
            .map_err(|source| StoreError::Open {
                path: remote.to_path_buf(),
                source,
            })
    }

    async fn close(&self, _reader: Self::Reader) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store reached over SSH using the storage credentials.
#[derive(Debug, Clone)]
pub struct SshStore {
    host: String,
    port: u16,
    credentials: SshCredentials,
}

/// A streaming remote read: the ssh child plus its stdout. The askpass
/// helper, when one was needed, lives as long as the transfer.
pub struct SshReader {
    child: Child,
    stdout: ChildStdout,
    remote: PathBuf,
    _askpass: Option<AskPass>,
}

impl SshStore {
    pub fn new(host: impl Into<String>, port: u16, credentials: SshCredentials) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
        }
    }

    fn command(&self, remote: &Path) -> Result<(Command, Option<AskPass>), StoreError> {
        let mut cmd = Command::new("ssh");
        cmd.arg("-i")
            .arg(&self.credentials.private_key_file)
            .arg("-oLogLevel=error")
            .arg("-oStrictHostKeyChecking=no")
            .arg("-oUserKnownHostsFile=/dev/null")
            .arg("-oConnectTimeout=30")
            .arg("-p")
            .arg(self.port.to_string())
            .arg(format!("{}@{}", self.credentials.username, self.host))
            .arg("cat")
            .arg(remote);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let askpass = if self.credentials.private_key_password.is_empty() {
            cmd.arg("-oBatchMode=yes");
            None
        } else {
            let askpass = AskPass::create(&self.credentials.private_key_password).map_err(
                |source| StoreError::Open {
                    path: remote.to_path_buf(),
                    source,
                },
            )?;
            askpass.apply(&mut cmd);
            Some(askpass)
        };
        Ok((cmd, askpass))
    }
}

#[async_trait]
impl ArtifactStore for SshStore {
    type Reader = SshReader;

    async fn open(&self, remote: &Path) -> Result<Self::Reader, StoreError> {
        let (mut cmd, askpass) = self.command(remote)?;
        let mut child = cmd.spawn().map_err(|source| StoreError::Open {
            path: remote.to_path_buf(),
            source,
        })?;
        let stdout = child.stdout.take().ok_or_else(|| StoreError::Transfer {
            path: remote.to_path_buf(),
            detail: "child stdout unavailable".to_string(),
        })?;
        Ok(SshReader {
            child,
            stdout,
            remote: remote.to_path_buf(),
            _askpass: askpass,
        })
    }

    async fn close(&self, mut reader: Self::Reader) -> Result<(), StoreError> {
        drop(reader.stdout);

        let mut stderr_text = String::new();
        if let Some(mut stderr) = reader.child.stderr.take() {
            let _ = stderr.read_to_string(&mut stderr_text).await;
        }

        let status = reader
            .child
            .wait()
            .await
            .map_err(|source| StoreError::Transfer {
                path: reader.remote.clone(),
                detail: source.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(StoreError::Transfer {
                path: reader.remote,
                detail: format!("ssh exited with {status}: {}", stderr_text.trim()),
            })
        }
    }
}

impl AsyncRead for SshReader {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
