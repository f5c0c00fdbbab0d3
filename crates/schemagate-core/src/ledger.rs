//! Migration ledger over the migration framework.
//!
//! The framework itself is a black box behind [`MigrationBackend`]. The
//! ledger adds canonical ordering, stop-at-first-failure application and the
//! history-only write used by drift reconciliation.

use std::{collections::BTreeSet, fmt};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    error::{DbError, DbResult},
    migration::MigrationRecord,
};

/// Migration framework primitives provided by the database driver.
#[async_trait]
pub trait MigrationBackend: Send + Sync {
    /// Every migration the framework knows about.
    async fn known_migrations(&self) -> DbResult<Vec<String>>;

    /// Rows of the history store.
    async fn history(&self) -> DbResult<Vec<MigrationRecord>>;

    /// Execute one migration's DDL and record it in history.
    async fn apply_migration(&self, migration_id: &str) -> DbResult<()>;

    /// Write a history row without executing any DDL.
    async fn insert_history(&self, record: &MigrationRecord) -> DbResult<()>;
}

/// A migration application that stopped on an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    /// Failing migration; `None` when listing pending migrations failed
    pub migration_id: Option<String>,
    /// Migrations applied before the failure, in order
    pub applied: Vec<String>,
    pub error: DbError,
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.migration_id {
            Some(id) => write!(f, "migration {id} failed: {}", self.error),
            None => write!(f, "listing pending migrations failed: {}", self.error),
        }
    }
}

impl std::error::Error for ApplyFailure {}

/// Ledger operations over a [`MigrationBackend`].
pub struct MigrationLedger<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B: MigrationBackend + ?Sized> MigrationLedger<'a, B> {
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Ids recorded as applied.
    pub async fn list_applied(&self) -> DbResult<BTreeSet<String>> {
        Ok(self
            .backend
            .history()
            .await?
            .into_iter()
            .filter(|r| r.applied)
            .map(|r| r.migration_id)
            .collect())
    }

    /// Known migrations not yet applied, in canonical (id) order.
    pub async fn list_pending(&self) -> DbResult<Vec<String>> {
        let applied = self.list_applied().await?;
        let mut pending: Vec<String> = self
            .backend
            .known_migrations()
            .await?
            .into_iter()
            .filter(|id| !applied.contains(id))
            .collect();
        pending.sort();
        pending.dedup();
        Ok(pending)
    }

    /// Apply exactly the oldest pending migration.
    ///
    /// Returns `Ok(None)` when nothing is pending.
    pub async fn apply_next(&self) -> Result<Option<String>, ApplyFailure> {
        let pending = self.list_pending().await.map_err(|error| ApplyFailure {
            migration_id: None,
            applied: Vec::new(),
            error,
        })?;

        let Some(next) = pending.into_iter().next() else {
            return Ok(None);
        };

        self.apply_one(&next).await.map_err(|error| ApplyFailure {
            migration_id: Some(next.clone()),
            applied: Vec::new(),
            error,
        })?;
        Ok(Some(next))
    }

    /// Apply every pending migration in order, stopping at the first failure.
    ///
    /// Returns the ids applied. A failure reports the failing id and the ids
    /// applied before it; nothing after the failing migration is attempted.
    pub async fn apply_all(&self) -> Result<Vec<String>, ApplyFailure> {
        let pending = self.list_pending().await.map_err(|error| ApplyFailure {
            migration_id: None,
            applied: Vec::new(),
            error,
        })?;

        let mut applied = Vec::with_capacity(pending.len());
        for id in pending {
            if let Err(error) = self.apply_one(&id).await {
                return Err(ApplyFailure {
                    migration_id: Some(id),
                    applied,
                    error,
                });
            }
            applied.push(id);
        }
        Ok(applied)
    }

    /// Record a migration as applied without executing its DDL.
    ///
    /// Reserved for drift reconciliation. Idempotent: returns `Ok(false)`
    /// and writes nothing when the migration is already recorded.
    pub async fn record_as_applied_without_executing(&self, migration_id: &str) -> DbResult<bool> {
        if self.list_applied().await?.contains(migration_id) {
            return Ok(false);
        }
        self.backend
            .insert_history(&MigrationRecord::applied_now(migration_id))
            .await?;
        info!(migration_id, "Recorded migration as applied without executing DDL");
        Ok(true)
    }

    async fn apply_one(&self, migration_id: &str) -> DbResult<()> {
        info!(migration_id, "Applying migration");
        self.backend
            .apply_migration(migration_id)
            .await
            .inspect_err(|e| warn!(migration_id, error = %e, "Migration failed"))
    }
}
