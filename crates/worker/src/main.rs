// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rtt-worker binary: configuration, wiring, and lifecycle.
//!
//! The process exits 0 on any graceful termination (signal, empty backlog,
//! budget exhaustion, operator switches) and 1 on unrecoverable errors such
//! as unreadable configuration or an unreachable database.

use anyhow::Context;
use clap::Parser;
use rtt_cache::{janitor, SshStore};
use rtt_core::{paths, WorkerSettings};
use rtt_db::{with_retries, DbParams};
use rtt_worker::args::Args;
use rtt_worker::artifacts::ArtifactFetcher;
use rtt_worker::board::{DbBoard, JobBoard};
use rtt_worker::forwarder::SshForwarder;
use rtt_worker::identity;
use rtt_worker::mailer::SmtpNotifier;
use rtt_worker::reaper::Reaper;
use rtt_worker::runner::RunnerContext;
use rtt_worker::shutdown;
use rtt_worker::worker::{Worker, WorkerOptions};
use sqlx::MySqlPool;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("rtt-worker: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = WorkerSettings::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;

    // Generated files are shared with co-located workers through the group.
    nix::sys::stat::umask(nix::sys::stat::Mode::from_bits_truncate(0o007));

    let log_dir = args
        .log_dir
        .clone()
        .unwrap_or_else(|| settings.backend.log_dir.clone());
    let _log_guard = setup_logging(&log_dir)?;

    if args.cleanup_only_flag() {
        return cleanup_only(&args, &settings, &log_dir).await;
    }

    let mut db_params = DbParams::from_settings(&settings.database)
        .with_endpoint(args.db_host.as_deref(), args.db_port);

    let mut forwarder = None;
    if args.forwarded_mysql_flag() {
        let tunnel =
            SshForwarder::start(&settings.storage, &db_params.host, db_params.port).await?;
        db_params = db_params.with_endpoint(Some("127.0.0.1"), Some(tunnel.local_port));
        info!(port = tunnel.local_port, "using forwarded database endpoint");
        forwarder = Some(tunnel);
    }

    let pool = rtt_db::connect(&db_params)
        .await
        .context("connecting to database")?;

    let worker_identity = identity::build(&settings.backend, &args);
    info!(worker_id = %worker_identity.worker_id, "registering worker");
    let worker_key = with_retries("register worker", || {
        rtt_db::workers::register(&pool, &worker_identity)
    })
    .await
    .context("registering worker")?;

    let board = DbBoard::new(pool.clone(), worker_key, worker_identity.address.clone());

    if args.clean_jobs_flag() {
        match Reaper::new().run_pass(&board).await {
            Ok(stats) => info!(?stats, "initial stuck-job pass complete"),
            Err(err) => warn!(error = %err, "initial stuck-job pass failed"),
        }
    }

    let (handle, shut) = shutdown::channel();
    shutdown::listen_for_signals(handle);

    let scratch_base = settings
        .cache
        .data_dir
        .parent()
        .unwrap_or(&settings.cache.data_dir)
        .to_path_buf();
    let scratch = paths::scratch_dir(&scratch_base, &worker_identity.worker_id);
    std::fs::create_dir_all(&scratch)
        .with_context(|| format!("creating scratch dir {}", scratch.display()))?;

    let store = SshStore::new(
        settings.storage.host.clone(),
        settings.storage.port,
        settings.storage.credentials.clone(),
    );
    let fetcher = ArtifactFetcher::new(
        store,
        settings.cache.data_dir.clone(),
        settings.cache.config_dir.clone(),
        settings.storage.data_dir.clone(),
        settings.storage.config_dir.clone(),
    );

    let max_sec_per_test = args.job_time.unwrap_or(settings.backend.max_sec_per_test);
    let runner = RunnerContext {
        rtt_binary: settings.binaries.rtt_binary.clone(),
        booltest_binary: settings.binaries.booltest_binary.clone(),
        max_sec_per_test,
        settings_json: None,
        db_endpoint: Some((db_params.host.clone(), db_params.port)),
        scratch_dir: Some(scratch.clone()),
    };
    let options = WorkerOptions {
        run_time: args.run_time.map(Duration::from_secs),
        all_time: args.all_time_flag(),
        worker_type: worker_identity.worker_type,
        max_sec_per_test,
    };

    let worker = Worker::new(
        board.clone(),
        SmtpNotifier::new(settings.backend.sender_email.clone()),
        fetcher,
        runner,
        shut,
        options,
        settings.cache.data_dir.clone(),
    );

    let reason = worker.run().await?;
    info!(?reason, "worker loop ended");

    if args.deactivate_flag() {
        if let Err(err) = board.deactivate_worker().await {
            warn!(error = %err, "worker deactivation failed");
        }
    }

    if args.clean_cache_flag() {
        if let Err(err) = clean_cache_against_db(&pool, &settings).await {
            error!(error = %err, "cache cleanup failed");
        }
    }
    if args.clean_logs_flag() {
        let (files, bytes) = janitor::clean_logs(&log_dir, janitor::LOG_EXPIRY);
        info!(files, bytes, "log cleanup complete");
    }
    janitor::remove_scratch(&scratch);

    if let Some(mut tunnel) = forwarder {
        tunnel.shutdown().await;
    }

    info!("terminating");
    Ok(())
}

/// `--cleanup-only 1`: run the janitor against the database and exit.
async fn cleanup_only(
    args: &Args,
    settings: &WorkerSettings,
    log_dir: &Path,
) -> anyhow::Result<()> {
    let mut db_params = DbParams::from_settings(&settings.database)
        .with_endpoint(args.db_host.as_deref(), args.db_port);

    let mut forwarder = None;
    if args.forwarded_mysql_flag() {
        let tunnel =
            SshForwarder::start(&settings.storage, &db_params.host, db_params.port).await?;
        db_params = db_params.with_endpoint(Some("127.0.0.1"), Some(tunnel.local_port));
        forwarder = Some(tunnel);
    }

    let pool = rtt_db::connect(&db_params)
        .await
        .context("connecting to database")?;

    clean_cache_against_db(&pool, settings).await?;
    let (files, bytes) = janitor::clean_logs(log_dir, janitor::LOG_EXPIRY);
    info!(files, bytes, "log cleanup complete");

    if let Some(mut tunnel) = forwarder {
        tunnel.shutdown().await;
    }
    Ok(())
}

/// Delete cached artifacts whose experiments are finished.
async fn clean_cache_against_db(
    pool: &MySqlPool,
    settings: &WorkerSettings,
) -> anyhow::Result<()> {
    let ids = janitor::cached_experiment_ids(&settings.cache.data_dir)
        .with_context(|| format!("listing cache {}", settings.cache.data_dir.display()))?;

    let mut finished = HashSet::new();
    for id in ids {
        let status = with_retries("experiment status", || {
            rtt_db::experiments::status(pool, id)
        })
        .await?;
        if matches!(status, Some(rtt_db::ExperimentStatus::Finished)) {
            finished.insert(id);
        }
    }

    let report = janitor::clean_cache(
        &settings.cache.data_dir,
        &settings.cache.config_dir,
        &finished,
    )?;
    info!(
        experiments = report.experiments_removed,
        files = report.files_removed,
        "cache cleanup complete"
    );
    Ok(())
}

/// File logging into the configured log directory plus stderr, the daily
/// rotation giving the janitor aged files to expire.
fn setup_logging(
    log_dir: &Path,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log dir {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "rtt-worker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}
