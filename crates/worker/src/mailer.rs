// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion notification mail.
//!
//! Submitters may leave an email address; when the last job of their
//! experiment settles, they get one message with the per-battery rollups.
//! Delivery goes through the local SMTP submission endpoint.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::{Message, SmtpTransport, Transport};
use rtt_db::{BatteryRollup, ExperimentInfo};
use thiserror::Error;

/// Local submission endpoint.
const SMTP_HOST: &str = "127.0.0.1";
const SMTP_PORT: u16 = 25;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address: {0}")]
    Address(String),
    #[error("mail build failed: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("mail send failed: {0}")]
    Send(String),
}

/// Sends experiment-finished notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify the experiment author, if one is on record.
    async fn experiment_finished(
        &self,
        info: &ExperimentInfo,
        rollups: &[BatteryRollup],
    ) -> Result<(), NotifyError>;
}

/// Production notifier submitting through localhost SMTP.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    sender: String,
}

impl SmtpNotifier {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn experiment_finished(
        &self,
        info: &ExperimentInfo,
        rollups: &[BatteryRollup],
    ) -> Result<(), NotifyError> {
        let Some(recipient) = info.author_email.as_deref() else {
            return Ok(());
        };

        let message = Message::builder()
            .from(
                self.sender
                    .parse()
                    .map_err(|_| NotifyError::Address(self.sender.clone()))?,
            )
            .to(recipient
                .parse()
                .map_err(|_| NotifyError::Address(recipient.to_string()))?)
            .subject(subject(info))
            .header(ContentType::TEXT_PLAIN)
            .body(render_body(info, rollups))?;

        let transport = SmtpTransport::builder_dangerous(SMTP_HOST)
            .port(SMTP_PORT)
            .build();

        // lettre's SMTP transport is blocking; sends are rare enough that a
        // blocking-task hop is the simplest correct integration.
        let recipient = recipient.to_string();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| NotifyError::Send(e.to_string()))?
            .map_err(|e| NotifyError::Send(e.to_string()))?;

        tracing::info!(recipient = %recipient, "completion mail sent");
        Ok(())
    }
}

/// `Subject:` line of the notification.
pub fn subject(info: &ExperimentInfo) -> String {
    format!("Experiment \"{}\" was finished", info.name)
}

/// Plain-text body: experiment metadata block plus per-battery rollups.
pub fn render_body(info: &ExperimentInfo, rollups: &[BatteryRollup]) -> String {
    use std::fmt::Write;

    let mut body = String::new();
    let _ = writeln!(body, "Hello,");
    let _ = writeln!(
        body,
        "your data analysis is complete. You can find basic experiment"
    );
    let _ = writeln!(body, "information and results below.");
    let _ = writeln!(body);
    let _ = writeln!(body, "=== Experiment information ===");
    let _ = writeln!(body, "ID: {}", info.id);
    let _ = writeln!(body, "Name: {}", info.name);
    if let Some(created) = info.created {
        let _ = writeln!(
            body,
            "Time of creation: {}",
            created.format("%H:%M:%S, %B %d, %Y")
        );
    }
    if let Some(config_file) = &info.config_file {
        let _ = writeln!(body, "Configuration file: {config_file}");
    }
    if let Some(data_file) = &info.data_file {
        let _ = writeln!(body, "Data file: {data_file}");
    }
    if let Some(digest) = &info.data_file_sha256 {
        let _ = writeln!(body, "Data hash (SHA-256): {digest}");
    }
    let _ = writeln!(body);
    let _ = writeln!(body, "=== Analysis results ===");
    for rollup in rollups {
        let _ = writeln!(body, "Battery name: {}", rollup.name);
        let _ = writeln!(body, "\tPassed tests: {}", rollup.passed_tests);
        let _ = writeln!(body, "\tTotal tests: {}", rollup.total_tests);
        let _ = writeln!(body);
    }
    let _ = writeln!(body);
    let _ = writeln!(body, "Regards,");
    let _ = writeln!(body, "RTT Team");
    body
}

#[cfg(test)]
#[path = "mailer_tests.rs"]
mod tests;
