// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity assembly: config defaults, CLI overrides, batch-scheduler
//! placement info.

use crate::args::Args;
use rtt_core::{BackendSettings, WorkerType};
use rtt_db::WorkerIdentity;

/// Environment variable PBS Pro sets inside scheduled jobs.
const PBS_JOBID: &str = "PBS_JOBID";

/// Build the identity the worker announces to the registry.
pub fn build(backend: &BackendSettings, args: &Args) -> WorkerIdentity {
    build_with_env(backend, args, std::env::var(PBS_JOBID).ok())
}

fn build_with_env(
    backend: &BackendSettings,
    args: &Args,
    pbs_jobid: Option<String>,
) -> WorkerIdentity {
    let mut worker_id = args
        .id
        .clone()
        .unwrap_or_else(|| backend.worker_id.clone());
    if args.id_randomize {
        worker_id = format!("{worker_id}-{}", uuid::Uuid::new_v4().simple());
    }

    let longterm = args.longterm_flag().unwrap_or(backend.longterm);
    let worker_type = if longterm {
        WorkerType::Longterm
    } else {
        WorkerType::Shortterm
    };

    let mut aux = args.aux.clone().or_else(|| backend.aux.clone());
    if args.pbspro {
        if let Some(jobid) = pbs_jobid {
            let tag = format!("pbs:{jobid}");
            aux = Some(match aux {
                Some(existing) => format!("{existing};{tag}"),
                None => tag,
            });
        }
    }

    WorkerIdentity {
        worker_id,
        name: args.name.clone().or_else(|| backend.worker_name.clone()),
        worker_type,
        address: local_address(),
        location: args.location.clone().or_else(|| backend.location.clone()),
        aux,
    }
}

/// Hostname recorded in `workers.worker_address` for diagnostics.
fn local_address() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
