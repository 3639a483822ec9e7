// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH askpass helper for key passphrases.
//!
//! OpenSSH only reads passphrases from a terminal or an `SSH_ASKPASS`
//! program. The helper is a short-lived 0700 script that echoes the
//! passphrase once and deletes itself; the passphrase therefore never
//! appears on a command line or in a log record.

use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// A materialized askpass helper script.
#[derive(Debug)]
pub struct AskPass {
    script: PathBuf,
}

impl AskPass {
    /// Write the helper script into the system temp directory.
    pub fn create(passphrase: &str) -> std::io::Result<Self> {
        let script = std::env::temp_dir().join(format!("rtt-askpass-{}.sh", uuid::Uuid::new_v4()));

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o700)
            .open(&script)?;
        writeln!(file, "#!/bin/sh")?;
        writeln!(file, "echo '{}'", shell_single_quote(passphrase))?;
        writeln!(file, "rm -f '{}' >/dev/null 2>&1", script.display())?;

        Ok(Self { script })
    }

    pub fn path(&self) -> &Path {
        &self.script
    }

    /// Wire the helper into an ssh invocation. `SSH_ASKPASS_REQUIRE=force`
    /// makes OpenSSH use the helper even with a controlling terminal.
    pub fn apply(&self, cmd: &mut tokio::process::Command) {
        cmd.env("SSH_ASKPASS", &self.script)
            .env("SSH_ASKPASS_REQUIRE", "force")
            .env("DISPLAY", ":0");
    }
}

impl Drop for AskPass {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.script);
    }
}

/// Escape a value for inclusion inside single quotes in a shell script.
fn shell_single_quote(value: &str) -> String {
    value.replace('\'', "'\\''")
}

#[cfg(test)]
#[path = "askpass_tests.rs"]
mod tests;
