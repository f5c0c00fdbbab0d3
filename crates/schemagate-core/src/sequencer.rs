//! Startup sequencer: the boot-time state machine.
//!
//! ```text
//! Start → ProbingConnectivity → ListingMigrations → ApplyingMigrations
//!       → [ReconcilingDrift → ApplyingMigrations] → ValidatingReadiness
//!       → {Ready | DegradedTransient | Blocked}
//! ```
//!
//! Runs once, before the request pipeline accepts connections. Round-trips
//! are strictly sequential and migrations apply in canonical order. The only
//! retry is the single re-application after a successful drift
//! reconciliation; transient connectivity retries belong to the driver.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, error, info, warn};

use crate::{
    catalog::CatalogQuery,
    classify::{classify, FailureClass},
    error::{ClassifiedError, DbError, DbResult},
    identifier::TableName,
    ledger::{MigrationBackend, MigrationLedger},
    migration::MigrationSet,
    policy::ExecutionContext,
    readiness::{
        apply_migrations_remediation, unreachable_verdict, ReadinessStatus, ReadinessValidator,
        ReadinessVerdict, DEFAULT_MIGRATE_COMMAND,
    },
    reconcile::{DriftReconciler, ReconcileOutcome},
};

/// Connection-opening primitive provided by the database driver.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open (and immediately release) a connection.
    async fn open(&self) -> DbResult<()>;
}

/// States of the startup state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum SequencerState {
    Start,
    ProbingConnectivity,
    ListingMigrations,
    ApplyingMigrations,
    ReconcilingDrift,
    ValidatingReadiness,
    Ready,
    DegradedTransient,
    Blocked,
}

impl From<ReadinessStatus> for SequencerState {
    fn from(status: ReadinessStatus) -> Self {
        match status {
            ReadinessStatus::Ready => Self::Ready,
            ReadinessStatus::DegradedTransient => Self::DegradedTransient,
            ReadinessStatus::Blocked => Self::Blocked,
        }
    }
}

/// Explicit sequencer configuration, passed in by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerConfig {
    pub execution_context: ExecutionContext,
    /// When false, pending migrations block startup and no DDL is attempted
    pub auto_apply_migrations: bool,
    pub critical_tables: Vec<TableName>,
    /// Command quoted in remediation text
    pub migrate_command: String,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            execution_context: ExecutionContext::default(),
            auto_apply_migrations: true,
            critical_tables: Vec::new(),
            migrate_command: DEFAULT_MIGRATE_COMMAND.to_string(),
        }
    }
}

/// Everything one startup attempt produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupReport {
    pub verdict: ReadinessVerdict,
    /// Visited states, in order, ending with the terminal state
    pub trace: Vec<SequencerState>,
    /// Migrations whose DDL was executed
    pub applied: Vec<String>,
    /// Migrations recorded as applied by drift reconciliation
    pub reconciled: Vec<String>,
}

#[derive(Default)]
struct Progress {
    trace: Vec<SequencerState>,
    applied: Vec<String>,
    reconciled: Vec<String>,
}

impl Progress {
    fn enter(&mut self, state: SequencerState) {
        debug!(%state, "Startup sequencer transition");
        self.trace.push(state);
    }

    fn finish(mut self, verdict: ReadinessVerdict) -> StartupReport {
        self.enter(verdict.status.into());
        StartupReport {
            verdict,
            trace: self.trace,
            applied: self.applied,
            reconciled: self.reconciled,
        }
    }
}

/// Composes connectivity probe, ledger, reconciler and validator.
pub struct StartupSequencer<'a, D: ?Sized> {
    db: &'a D,
    plan: &'a MigrationSet,
    config: SequencerConfig,
}

impl<'a, D> StartupSequencer<'a, D>
where
    D: Connector + MigrationBackend + CatalogQuery + ?Sized,
{
    pub const fn new(db: &'a D, plan: &'a MigrationSet, config: SequencerConfig) -> Self {
        Self { db, plan, config }
    }

    pub const fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Run the full startup procedure once.
    ///
    /// `Ok` carries a verdict (including `DegradedTransient` for transient
    /// unavailability and `Blocked` for failed validation). `Err` is a
    /// classified failure that must abort startup outside the testing
    /// context.
    pub async fn run(&self) -> Result<StartupReport, ClassifiedError> {
        let mut progress = Progress::default();
        progress.enter(SequencerState::Start);
        info!(
            context = %self.config.execution_context,
            auto_apply = self.config.auto_apply_migrations,
            "Starting database readiness sequence"
        );

        progress.enter(SequencerState::ProbingConnectivity);
        if let Err(e) = self.db.open().await {
            return self.absorb_transient(progress, SequencerState::ProbingConnectivity, e);
        }

        progress.enter(SequencerState::ListingMigrations);
        let ledger = MigrationLedger::new(self.db);
        let pending = match ledger.list_pending().await {
            Ok(pending) => pending,
            Err(e) => return self.absorb_transient(progress, SequencerState::ListingMigrations, e),
        };

        if pending.is_empty() {
            info!("No pending migrations");
        } else if self.config.auto_apply_migrations {
            info!(count = pending.len(), "Pending migrations found");
            if let Err(e) = self.apply_with_reconcile(&mut progress).await {
                progress.enter(SequencerState::Blocked);
                error!(class = %e.class, stage = %e.stage, error = %e.source, "Startup sequence failed");
                return Err(e);
            }
        } else {
            warn!(
                pending = ?pending,
                "Pending migrations and automatic application is disabled"
            );
            let verdict = ReadinessVerdict::blocked(
                format!(
                    "{} pending migration(s) and automatic migration application is disabled: {}",
                    pending.len(),
                    pending.join(", ")
                ),
                Vec::new(),
                Vec::new(),
                apply_migrations_remediation(&self.config.migrate_command),
            );
            return Ok(progress.finish(verdict));
        }

        progress.enter(SequencerState::ValidatingReadiness);
        let verdict = ReadinessValidator::new(self.db)
            .with_migrate_command(self.config.migrate_command.clone())
            .validate(&self.config.critical_tables)
            .await;
        info!(status = %verdict.status, reason = %verdict.reason, "Database readiness verdict");
        Ok(progress.finish(verdict))
    }

    /// Apply pending migrations; on a schema conflict reconcile once and retry.
    async fn apply_with_reconcile(&self, progress: &mut Progress) -> Result<(), ClassifiedError> {
        let ledger = MigrationLedger::new(self.db);
        let mut reconciled_once = false;

        loop {
            progress.enter(SequencerState::ApplyingMigrations);
            let failure = match ledger.apply_all().await {
                Ok(applied) => {
                    info!(count = applied.len(), "Migrations applied");
                    progress.applied.extend(applied);
                    return Ok(());
                }
                Err(failure) => failure,
            };
            progress.applied.extend(failure.applied.iter().cloned());

            let class = classify(&failure.error);
            let Some(migration_id) = failure.migration_id else {
                return Err(self.classified(class, SequencerState::ApplyingMigrations, failure.error));
            };

            if class != FailureClass::SchemaConflict || reconciled_once {
                return Err(self
                    .classified(class, SequencerState::ApplyingMigrations, failure.error)
                    .for_migration(migration_id));
            }

            progress.enter(SequencerState::ReconcilingDrift);
            reconciled_once = true;
            warn!(
                migration_id = %migration_id,
                error = %failure.error,
                "Schema conflict while applying migration; reconciling drift"
            );

            let outcome = DriftReconciler::new(self.db, self.db, self.plan)
                .reconcile(&migration_id)
                .await
                .map_err(|e| {
                    self.classified(classify(&e), SequencerState::ReconcilingDrift, e)
                        .for_migration(migration_id.clone())
                })?;
            progress.reconciled.extend(outcome.marked.iter().cloned());

            if !outcome.retryable() {
                return Err(ClassifiedError::new(
                    FailureClass::SchemaConflict,
                    SequencerState::ReconcilingDrift,
                    drift_remediation(&outcome),
                    failure.error,
                )
                .for_migration(migration_id));
            }
        }
    }

    /// Transient failures become a `DegradedTransient` report; others abort.
    fn absorb_transient(
        &self,
        progress: Progress,
        stage: SequencerState,
        error: DbError,
    ) -> Result<StartupReport, ClassifiedError> {
        let class = classify(&error);
        if class == FailureClass::Transient {
            warn!(%stage, error = %error, "Database temporarily unavailable; continuing degraded");
            return Ok(progress.finish(unreachable_verdict(&error, &self.config.migrate_command)));
        }
        error!(%stage, %class, error = %error, "Database unusable");
        Err(self.classified(class, stage, error))
    }

    fn classified(&self, class: FailureClass, stage: SequencerState, error: DbError) -> ClassifiedError {
        let remediation = match class {
            FailureClass::Transient => {
                "retry startup once the database is reachable; the driver already retried".to_string()
            }
            FailureClass::SchemaConflict => {
                "inspect the schema for objects the migration history does not record".to_string()
            }
            FailureClass::MissingObject => apply_migrations_remediation(&self.config.migrate_command),
            FailureClass::Fatal => {
                "inspect the database error; check credentials, permissions and the connection string"
                    .to_string()
            }
        };
        ClassifiedError::new(class, stage, remediation, error)
    }
}

fn drift_remediation(outcome: &ReconcileOutcome) -> String {
    let detail = match (&outcome.stopped_at, outcome.missing_tables.is_empty()) {
        (Some(id), false) => format!(
            "migration {id} is only partially present (missing: {})",
            outcome
                .missing_tables
                .iter()
                .map(TableName::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        (Some(id), true) => format!("migration {id} cannot be confirmed from the catalog"),
        (None, _) => "no pending migration matched the existing tables".to_string(),
    };
    format!(
        "schema drift could not be reconciled automatically: {detail}; \
         inspect the database and complete or record the migration manually"
    )
}
