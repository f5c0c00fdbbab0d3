//! CLI command handlers that bridge between `clap` and the bootstrap

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::ArgMatches;
use schemagate_core::{
    config::load_config, AppConfig, HealthReport, MigrationLedger, ReadinessStatus,
    ReadinessVerdict, StartupAbort,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
    bootstrap::{bootstrap, BootstrapOptions},
    db::SqliteDatabase,
    health::{abort_signal, router, HealthState},
    shutdown::shutdown_signal,
};

/// The command ran but the database is not ready.
#[derive(Debug, Error)]
#[error("database is not ready: {reason}")]
pub struct NotReady {
    pub reason: String,
    pub code: i32,
}

impl NotReady {
    fn from_verdict(verdict: &ReadinessVerdict) -> Self {
        Self {
            reason: verdict.reason.clone(),
            code: verdict_exit_code(verdict),
        }
    }
}

/// Exit code for a verdict: 0 ready, 2 degraded, 3 missing tables, else 4.
pub fn verdict_exit_code(verdict: &ReadinessVerdict) -> i32 {
    match verdict.status {
        ReadinessStatus::Ready => 0,
        ReadinessStatus::DegradedTransient => 2,
        ReadinessStatus::Blocked if !verdict.missing_tables.is_empty() => 3,
        ReadinessStatus::Blocked => 4,
    }
}

/// Process exit code for any error surfaced by a handler
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(abort) = err.downcast_ref::<StartupAbort>() {
        return abort.exit_code();
    }
    if let Some(not_ready) = err.downcast_ref::<NotReady>() {
        return not_ready.code;
    }
    err.downcast_ref::<schemagate_core::Error>()
        .map_or(1, schemagate_core::Error::exit_code)
}

/// Format an error for user display (no stack traces)
pub fn format_error(err: &anyhow::Error) -> String {
    let msg = err.to_string();
    if let Some(source) = err.source() {
        let source_msg = source.to_string();
        if !msg.contains(&source_msg) && !source_msg.is_empty() {
            return format!("{msg}\nCause: {source_msg}");
        }
    }
    msg
}

pub async fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("serve", sub_m)) => handle_serve(sub_m).await,
        Some(("check", sub_m)) => handle_check(sub_m).await,
        Some(("migrate", sub_m)) => handle_migrate(sub_m).await,
        Some(("status", sub_m)) => handle_status(sub_m).await,
        _ => anyhow::bail!("Unknown command. Run 'schemagate --help' for usage."),
    }
}

fn config_path(sub_m: &ArgMatches) -> Option<PathBuf> {
    sub_m.get_one::<PathBuf>("config").cloned()
}

fn load(sub_m: &ArgMatches) -> Result<(AppConfig, Option<PathBuf>)> {
    let path = config_path(sub_m);
    let config = load_config(path.as_deref())?;
    Ok((config, path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{text}");
    }
    Ok(())
}

pub async fn handle_serve(sub_m: &ArgMatches) -> Result<()> {
    let (config, path) = load(sub_m)?;
    let bind_addr = config.bind_addr()?;
    let started = bootstrap(&config, path.as_deref(), BootstrapOptions::default()).await?;

    let state = Arc::new(HealthState::new(
        Arc::clone(&started.db),
        started.verdict,
        started.plan,
        started.sequencer,
    ));
    let aborted = state.aborted();
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!(%bind_addr, "Serving health endpoint");

    let stop = {
        let aborted = aborted.clone();
        async move {
            tokio::select! {
                () = shutdown_signal() => {}
                () = abort_signal(aborted) => {}
            }
        }
    };
    axum::serve(listener, router(state))
        .with_graceful_shutdown(stop)
        .await
        .context("Health server failed")?;

    started.db.close().await;
    let abort = aborted.borrow().as_ref().cloned();
    if let Some(abort) = abort {
        return Err(abort.into());
    }
    info!("Shutdown complete");
    Ok(())
}

pub async fn handle_check(sub_m: &ArgMatches) -> Result<()> {
    let (config, path) = load(sub_m)?;
    let started = bootstrap(&config, path.as_deref(), BootstrapOptions::default()).await?;
    started.db.close().await;

    print_json(&HealthReport::from_verdict(&started.verdict))?;
    ensure_ready(&started.verdict)
}

#[derive(Debug, Serialize)]
struct MigrateOutput {
    status: ReadinessStatus,
    applied: Vec<String>,
    reconciled: Vec<String>,
    reason: String,
}

pub async fn handle_migrate(sub_m: &ArgMatches) -> Result<()> {
    let (config, path) = load(sub_m)?;
    let options = BootstrapOptions {
        force_auto_apply: true,
    };
    let started = bootstrap(&config, path.as_deref(), options).await?;
    started.db.close().await;

    let (applied, reconciled) = started
        .report
        .map(|r| (r.applied, r.reconciled))
        .unwrap_or_default();
    print_json(&MigrateOutput {
        status: started.verdict.status,
        applied,
        reconciled,
        reason: started.verdict.reason.clone(),
    })?;
    ensure_ready(&started.verdict)
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    applied: Vec<String>,
    pending: Vec<String>,
}

pub async fn handle_status(sub_m: &ArgMatches) -> Result<()> {
    let (config, _) = load(sub_m)?;
    let db = SqliteDatabase::connect(&config.database)?;
    let ledger = MigrationLedger::new(&db);

    let applied = ledger
        .list_applied()
        .await
        .context("Failed to read migration history")?;
    let pending = ledger
        .list_pending()
        .await
        .context("Failed to list pending migrations")?;
    db.close().await;

    print_json(&StatusOutput {
        applied: applied.into_iter().collect(),
        pending,
    })
}

fn ensure_ready(verdict: &ReadinessVerdict) -> Result<()> {
    if verdict.is_ready() {
        Ok(())
    } else {
        Err(NotReady::from_verdict(verdict).into())
    }
}
