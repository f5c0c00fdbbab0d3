//! Readiness validation and the readiness verdict.

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{info, warn};

use crate::{
    catalog::{CatalogProber, CatalogQuery},
    classify::{classify, FailureClass},
    error::DbError,
    identifier::TableName,
};

/// Default remediation command printed in diagnostics.
pub const DEFAULT_MIGRATE_COMMAND: &str = "schemagate migrate";

/// Outcome class of a startup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ReadinessStatus {
    /// Critical tables present and queryable
    Ready,
    /// Database temporarily unreachable; process may run, health is unhealthy
    DegradedTransient,
    /// Database unusable without intervention
    Blocked,
}

/// Single structured outcome of the startup sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessVerdict {
    pub status: ReadinessStatus,
    pub reason: String,
    pub missing_tables: Vec<String>,
    pub unqueryable_tables: Vec<String>,
    pub remediation: Option<String>,
}

impl ReadinessVerdict {
    pub fn ready() -> Self {
        Self {
            status: ReadinessStatus::Ready,
            reason: "All critical tables exist and are queryable".to_string(),
            missing_tables: Vec::new(),
            unqueryable_tables: Vec::new(),
            remediation: None,
        }
    }

    pub fn degraded_transient(reason: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self {
            status: ReadinessStatus::DegradedTransient,
            reason: reason.into(),
            missing_tables: Vec::new(),
            unqueryable_tables: Vec::new(),
            remediation: Some(remediation.into()),
        }
    }

    pub fn blocked(
        reason: impl Into<String>,
        missing_tables: Vec<String>,
        unqueryable_tables: Vec<String>,
        remediation: impl Into<String>,
    ) -> Self {
        Self {
            status: ReadinessStatus::Blocked,
            reason: reason.into(),
            missing_tables,
            unqueryable_tables,
            remediation: Some(remediation.into()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ReadinessStatus::Ready
    }

    pub fn is_blocked(&self) -> bool {
        self.status == ReadinessStatus::Blocked
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ReadinessStatus::DegradedTransient
    }
}

/// Remediation text for missing schema objects.
pub fn apply_migrations_remediation(migrate_command: &str) -> String {
    format!("apply pending migrations: run `{migrate_command}`")
}

/// Verdict for a database that could not be reached or probed.
///
/// The reason is built from the failure class only; driver text stays in logs.
pub fn unreachable_verdict(error: &DbError, migrate_command: &str) -> ReadinessVerdict {
    match classify(error) {
        FailureClass::Transient => ReadinessVerdict::degraded_transient(
            "Database is not currently available",
            "no action needed if the outage is temporary; /health reports healthy once the database responds",
        ),
        FailureClass::MissingObject => ReadinessVerdict::blocked(
            "Database objects are missing",
            Vec::new(),
            Vec::new(),
            apply_migrations_remediation(migrate_command),
        ),
        class @ (FailureClass::SchemaConflict | FailureClass::Fatal) => ReadinessVerdict::blocked(
            format!("Database probe failed ({class})"),
            Vec::new(),
            Vec::new(),
            "check the connection string, credentials and database permissions",
        ),
    }
}

/// Validates that critical tables exist and can be read.
pub struct ReadinessValidator<'a, Q: ?Sized> {
    prober: CatalogProber<'a, Q>,
    migrate_command: String,
}

impl<'a, Q: CatalogQuery + ?Sized> ReadinessValidator<'a, Q> {
    pub fn new(catalog: &'a Q) -> Self {
        Self {
            prober: CatalogProber::new(catalog),
            migrate_command: DEFAULT_MIGRATE_COMMAND.to_string(),
        }
    }

    /// Command quoted in remediation text.
    #[must_use]
    pub fn with_migrate_command(mut self, command: impl Into<String>) -> Self {
        self.migrate_command = command.into();
        self
    }

    /// Probe every critical table and produce a verdict.
    pub async fn validate(&self, critical_tables: &[TableName]) -> ReadinessVerdict {
        let existence = match self.prober.try_table_existence_batch(critical_tables).await {
            Ok(existence) => existence,
            Err(e) => {
                warn!(error = %e, "Readiness probe could not reach the catalog");
                return unreachable_verdict(&e, &self.migrate_command);
            }
        };

        let (present, missing): (Vec<&TableName>, Vec<&TableName>) = critical_tables
            .iter()
            .partition(|t| existence.get(*t).copied().unwrap_or(false));
        let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();

        if present.is_empty() && !missing.is_empty() {
            warn!(tables = ?missing, "No critical tables exist");
            return ReadinessVerdict::blocked(
                "Database migrations not applied: none of the critical tables exist",
                missing,
                Vec::new(),
                apply_migrations_remediation(&self.migrate_command),
            );
        }
        if !missing.is_empty() {
            warn!(tables = ?missing, "Critical tables missing");
            return ReadinessVerdict::blocked(
                format!("Critical tables missing: {}", missing.join(", ")),
                missing,
                Vec::new(),
                apply_migrations_remediation(&self.migrate_command),
            );
        }

        let mut unqueryable = Vec::new();
        for table in present {
            if let Err(e) = self.prober.try_table_is_queryable(table).await {
                if classify(&e) == FailureClass::Transient {
                    warn!(table = %table, error = %e, "Database became unavailable during readiness probe");
                    return unreachable_verdict(&e, &self.migrate_command);
                }
                warn!(table = %table, error = %e, "Critical table is not queryable");
                unqueryable.push(table.to_string());
            }
        }

        if !unqueryable.is_empty() {
            return ReadinessVerdict::blocked(
                format!(
                    "Critical tables exist but cannot be queried: {}",
                    unqueryable.join(", ")
                ),
                Vec::new(),
                unqueryable,
                "grant the application login SELECT permission on the listed tables",
            );
        }

        info!(tables = critical_tables.len(), "All critical tables ready");
        ReadinessVerdict::ready()
    }
}
