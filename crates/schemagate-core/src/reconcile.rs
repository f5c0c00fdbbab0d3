//! Schema-drift reconciliation.
//!
//! Runs after applying a migration failed because its objects already
//! exist. Walks pending migrations oldest-first and records a migration as
//! applied (history row only, no DDL) when every table it is responsible for
//! is physically present. The walk stops at the first migration that cannot
//! be fully confirmed, so nothing is skipped ahead of an unconfirmed
//! migration and partial matches stay pending.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::{
    catalog::{CatalogProber, CatalogQuery},
    error::DbResult,
    identifier::TableName,
    ledger::{MigrationBackend, MigrationLedger},
    migration::MigrationSet,
};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Migrations newly recorded as applied, in order
    pub marked: Vec<String>,
    /// First pending migration that could not be confirmed
    pub stopped_at: Option<String>,
    /// Tables of `stopped_at` that are not present
    pub missing_tables: Vec<TableName>,
}

impl ReconcileOutcome {
    /// Whether applying migrations again can make progress.
    pub fn retryable(&self) -> bool {
        !self.marked.is_empty()
    }
}

/// Reconciles migration history with the physical schema.
pub struct DriftReconciler<'a, B: ?Sized, Q: ?Sized> {
    ledger: MigrationLedger<'a, B>,
    prober: CatalogProber<'a, Q>,
    plan: &'a MigrationSet,
}

impl<'a, B, Q> DriftReconciler<'a, B, Q>
where
    B: MigrationBackend + ?Sized,
    Q: CatalogQuery + ?Sized,
{
    pub const fn new(backend: &'a B, catalog: &'a Q, plan: &'a MigrationSet) -> Self {
        Self {
            ledger: MigrationLedger::new(backend),
            prober: CatalogProber::new(catalog),
            plan,
        }
    }

    /// Reconcile after `failed_migration_id` failed with a schema conflict.
    ///
    /// Idempotent: a second pass with no schema change marks nothing.
    pub async fn reconcile(&self, failed_migration_id: &str) -> DbResult<ReconcileOutcome> {
        let pending = self.ledger.list_pending().await?;
        if pending.first().map(String::as_str) != Some(failed_migration_id) {
            warn!(
                failed_migration_id,
                oldest_pending = pending.first().map(String::as_str),
                "Conflicting migration is not the oldest pending one"
            );
        }

        let candidate_tables: Vec<TableName> = pending
            .iter()
            .filter_map(|id| self.plan.tables_for(id))
            .flatten()
            .cloned()
            .collect();
        let present = self
            .prober
            .try_table_existence_batch(&candidate_tables)
            .await?;

        let mut outcome = ReconcileOutcome::default();
        for id in &pending {
            let missing = self.missing_tables(id, &present);
            match missing {
                Some(missing) if missing.is_empty() => {
                    if self.ledger.record_as_applied_without_executing(id).await? {
                        outcome.marked.push(id.clone());
                    }
                }
                Some(missing) => {
                    info!(
                        migration_id = %id,
                        missing = ?missing.iter().map(TableName::as_str).collect::<Vec<_>>(),
                        "Migration only partially present; leaving it pending"
                    );
                    outcome.stopped_at = Some(id.clone());
                    outcome.missing_tables = missing;
                    break;
                }
                None => {
                    info!(
                        migration_id = %id,
                        "Migration declares no tables; cannot confirm it from the catalog"
                    );
                    outcome.stopped_at = Some(id.clone());
                    break;
                }
            }
        }

        info!(
            marked = outcome.marked.len(),
            stopped_at = outcome.stopped_at.as_deref(),
            "Drift reconciliation finished"
        );
        Ok(outcome)
    }

    /// Tables of `id` not present. `None` when the plan cannot vouch for `id`
    /// (unknown migration or no declared tables).
    fn missing_tables(
        &self,
        id: &str,
        present: &BTreeMap<TableName, bool>,
    ) -> Option<Vec<TableName>> {
        let tables = self.plan.tables_for(id).filter(|t| !t.is_empty())?;
        Some(
            tables
                .iter()
                .filter(|t| !present.get(*t).copied().unwrap_or(false))
                .cloned()
                .collect(),
        )
    }
}
