//! Process bootstrap: connect, run the startup sequence once, enforce the
//! termination policy.

use std::{path::Path, sync::Arc};

use anyhow::Result;
use schemagate_core::{
    enforce, AppConfig, ExecutionContext, MigrationSet, ReadinessVerdict, SequencerConfig,
    StartupReport, StartupSequencer,
};
use tracing::{error, info};

use crate::db::{migration_set, SqliteDatabase};

/// Everything a successful bootstrap hands to the serving layer.
pub struct Bootstrapped {
    pub db: Arc<SqliteDatabase>,
    pub verdict: ReadinessVerdict,
    /// `None` when the sequence ended in a classified error that the
    /// execution context let through
    pub report: Option<StartupReport>,
    pub plan: MigrationSet,
    pub sequencer: SequencerConfig,
}

/// Knobs the CLI can force regardless of configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapOptions {
    pub force_auto_apply: bool,
}

/// Run the startup sequence and apply the termination policy.
///
/// # Errors
///
/// Returns `StartupAbort` (after logging its diagnostic) when the database
/// blocks startup outside the testing context, or a core `Error` for an
/// invalid configuration or migration plan.
pub async fn bootstrap(
    config: &AppConfig,
    config_path: Option<&Path>,
    options: BootstrapOptions,
) -> Result<Bootstrapped> {
    let mut sequencer = config.sequencer_config(config_path)?;
    if options.force_auto_apply {
        sequencer.auto_apply_migrations = true;
    }

    let plan = migration_set()?;
    let db = Arc::new(SqliteDatabase::connect(&config.database)?);
    let context = sequencer.execution_context;

    info!(
        %context,
        url = %config.database.url,
        migrations = plan.len(),
        "Bootstrapping database"
    );
    let outcome = StartupSequencer::new(db.as_ref(), &plan, sequencer.clone())
        .run()
        .await;
    let report = outcome.as_ref().ok().cloned();

    let verdict = match enforce(outcome, context) {
        Ok(verdict) => verdict,
        Err(abort) => {
            error!(
                exit_code = abort.exit_code(),
                "{}",
                abort.diagnostic()
            );
            db.close().await;
            return Err(abort.into());
        }
    };

    log_verdict(&verdict, context);
    Ok(Bootstrapped {
        db,
        verdict,
        report,
        plan,
        sequencer,
    })
}

fn log_verdict(verdict: &ReadinessVerdict, context: ExecutionContext) {
    if verdict.is_ready() {
        info!(%context, "Database ready");
    } else {
        info!(
            %context,
            status = %verdict.status,
            reason = %verdict.reason,
            "Continuing startup without a ready database"
        );
    }
}
