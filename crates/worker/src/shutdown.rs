// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful-shutdown signal shared between the main loop and the supervisor.
//!
//! A termination signal flips a watch flag; the loop examines it at the top
//! of each iteration and the supervisor selects on it between child polls.
//! The in-flight job is deliberately left `running` so the reaper recovers
//! it after the heartbeat window.

use tokio::sync::watch;

/// Request side, held by the signal listener.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn request(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observe side, cloned into every component that must stop promptly.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested. A closed channel counts as a
    /// request: the program is unwinding and children must stop.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

/// Listen for SIGTERM/SIGINT and flip the shutdown flag.
pub fn listen_for_signals(handle: ShutdownHandle) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "cannot install SIGTERM handler");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "cannot install SIGINT handler");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
        handle.request();
    });
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
