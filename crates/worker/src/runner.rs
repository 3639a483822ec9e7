// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-runner invocation: binary selection and the argument contract.

use rtt_core::{Battery, Family};
use rtt_db::JobClaim;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

/// Everything needed to build a runner command line.
#[derive(Debug, Clone)]
pub struct RunnerContext {
    pub rtt_binary: PathBuf,
    pub booltest_binary: PathBuf,
    pub max_sec_per_test: u64,
    /// Optional runner settings JSON passed via `-s`.
    pub settings_json: Option<PathBuf>,
    /// Endpoint the runner should use to write results, when it differs
    /// from the runner's own configuration (CLI override or SSH forwarder).
    pub db_endpoint: Option<(String, u16)>,
    /// Per-worker scratch directory passed via `--rpath`.
    pub scratch_dir: Option<PathBuf>,
}

impl RunnerContext {
    /// The binary executing this battery's family.
    pub fn binary(&self, battery: Battery) -> &Path {
        match battery.family() {
            Family::Rtt => &self.rtt_binary,
            Family::BoolTest => &self.booltest_binary,
        }
    }

    /// Wall-clock deadline for one job of this battery.
    pub fn deadline(&self, battery: Battery) -> Duration {
        Duration::from_secs_f64(
            self.max_sec_per_test as f64 * battery.family().deadline_multiplier(),
        )
    }

    /// Argument vector for one job. The booltest family takes the same
    /// skeleton minus the result-backend selector.
    pub fn args(&self, claim: &JobClaim, config_path: &Path, data_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-b".to_string(),
            claim.battery.tag().to_string(),
            "-c".to_string(),
            config_path.display().to_string(),
            "-f".to_string(),
            data_path.display().to_string(),
        ];
        if claim.battery.family() == Family::Rtt {
            args.push("-r".to_string());
            args.push("db_mysql".to_string());
        }
        args.push("--eid".to_string());
        args.push(claim.experiment_id.to_string());
        args.push("--jid".to_string());
        args.push(claim.job_id.to_string());

        if let Some(settings) = &self.settings_json {
            args.push("-s".to_string());
            args.push(settings.display().to_string());
        }
        if let Some((host, port)) = &self.db_endpoint {
            args.push("--db-host".to_string());
            args.push(host.clone());
            args.push("--db-port".to_string());
            args.push(port.to_string());
        }
        if let Some(scratch) = &self.scratch_dir {
            args.push("--rpath".to_string());
            args.push(scratch.display().to_string());
        }
        args
    }

    /// Ready-to-spawn command: own process group, piped output, library
    /// path extended with the binary's directory so the runner finds its
    /// bundled shared objects.
    pub fn command(
        &self,
        claim: &JobClaim,
        config_path: &Path,
        data_path: &Path,
    ) -> tokio::process::Command {
        let binary = self.binary(claim.battery);
        let mut cmd = tokio::process::Command::new(binary);
        cmd.args(self.args(claim, config_path, data_path));
        if let Some(dir) = binary.parent() {
            cmd.current_dir(dir);
            cmd.env("LD_LIBRARY_PATH", extend_lib_path(dir));
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        cmd
    }
}

/// Prepend an existing LD_LIBRARY_PATH to the runner directory.
fn extend_lib_path(dir: &Path) -> String {
    match std::env::var("LD_LIBRARY_PATH") {
        Ok(existing) if !existing.is_empty() => format!("{existing}:{}", dir.display()),
        _ => dir.display().to_string(),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
