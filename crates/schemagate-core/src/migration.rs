//! Migration plan and history record types.
//!
//! [`MigrationSet`] is the static plan compiled into the application: the
//! ordered migrations and, for each one, the tables it is responsible for
//! creating. [`MigrationRecord`] is one row of observed history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{identifier::TableName, Error, Result};

/// A migration known to the codebase and the tables it creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationDescriptor {
    /// Canonical id, timestamp-prefixed (e.g. `20240101000000_InitialCreate`)
    pub id: String,
    /// Tables this migration creates
    pub tables: Vec<TableName>,
}

impl MigrationDescriptor {
    /// Build a descriptor, validating every table name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMigrationSet` for an empty id and
    /// `Error::InvalidIdentifier` for a bad table name.
    pub fn new(id: impl Into<String>, tables: &[&str]) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidMigrationSet(
                "migration id cannot be empty".to_string(),
            ));
        }
        let tables = tables
            .iter()
            .map(|t| TableName::parse(t))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { id, tables })
    }
}

/// Ordered, compiled-in migration plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSet {
    migrations: Vec<MigrationDescriptor>,
}

impl MigrationSet {
    /// Build a plan. Ids must be unique and strictly ascending.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMigrationSet` when ids repeat or are out of order.
    pub fn new(migrations: Vec<MigrationDescriptor>) -> Result<Self> {
        if let Some(pair) = migrations.windows(2).find(|w| w[0].id >= w[1].id) {
            return Err(Error::InvalidMigrationSet(format!(
                "migration ids must be unique and ascending: '{}' is followed by '{}'",
                pair[0].id, pair[1].id
            )));
        }
        Ok(Self { migrations })
    }

    pub fn iter(&self) -> impl Iterator<Item = &MigrationDescriptor> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MigrationDescriptor> {
        self.migrations.iter().find(|m| m.id == id)
    }

    /// Ids in canonical order.
    pub fn ids(&self) -> Vec<String> {
        self.migrations.iter().map(|m| m.id.clone()).collect()
    }

    /// Tables a migration is responsible for; `None` for unknown ids.
    pub fn tables_for(&self, id: &str) -> Option<&[TableName]> {
        self.get(id).map(|m| m.tables.as_slice())
    }
}

/// One row of migration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub migration_id: String,
    pub applied: bool,
    /// Version of the tool that wrote the row
    pub product_version: String,
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationRecord {
    /// A record for a migration applied now by this build.
    pub fn applied_now(migration_id: impl Into<String>) -> Self {
        Self {
            migration_id: migration_id.into(),
            applied: true,
            product_version: env!("CARGO_PKG_VERSION").to_string(),
            applied_at: Some(Utc::now()),
        }
    }
}
