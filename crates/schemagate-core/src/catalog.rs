//! Catalog prober: read-only questions about physical tables.
//!
//! Every probe validates the table name against the identifier allow-list
//! before any SQL is rendered. Names that fail validation are answered with
//! `false` without touching the connection.
//!
//! The fail-closed methods (`table_exists`, `table_is_queryable`,
//! `table_existence_batch`) swallow driver errors and answer `false`. The
//! `try_*` variants surface the driver error for callers that need to tell
//! "missing" apart from "unreachable" (readiness validation, reconciliation).

use std::collections::BTreeMap;

use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::{error::DbResult, identifier::TableName};

/// SQL dialect of the underlying catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Dialect {
    Sqlite,
    SqlServer,
    Postgres,
}

impl Dialect {
    /// Positional parameter placeholder (1-based index).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite => "?".to_string(),
            Self::SqlServer => format!("@p{index}"),
            Self::Postgres => format!("${index}"),
        }
    }

    /// Quote an already validated identifier.
    pub fn quote(self, name: &TableName) -> String {
        match self {
            Self::Sqlite | Self::Postgres => format!("\"{name}\""),
            Self::SqlServer => format!("[{name}]"),
        }
    }

    /// `COUNT(*)` of catalog rows matching one table name (one parameter).
    pub fn table_count_sql(self) -> String {
        let p = self.placeholder(1);
        match self {
            Self::Sqlite => {
                format!(
                    "SELECT COUNT(*) FROM sqlite_master \
                     WHERE type = 'table' AND name = {p} COLLATE NOCASE"
                )
            }
            Self::SqlServer => format!(
                "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME = {p}"
            ),
            Self::Postgres => format!(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_type = 'BASE TABLE' AND table_name = {p}"
            ),
        }
    }

    /// Names of existing tables among `count` parameters.
    pub fn table_names_sql(self, count: usize) -> String {
        let params = (1..=count).map(|i| self.placeholder(i)).join(", ");
        match self {
            Self::Sqlite => format!(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name COLLATE NOCASE IN ({params})"
            ),
            Self::SqlServer => format!(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME IN ({params})"
            ),
            Self::Postgres => format!(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_type = 'BASE TABLE' AND table_name IN ({params})"
            ),
        }
    }

    /// Bounded read of a single row.
    pub fn probe_sql(self, name: &TableName) -> String {
        let quoted = self.quote(name);
        match self {
            Self::Sqlite | Self::Postgres => format!("SELECT 1 FROM {quoted} LIMIT 1"),
            Self::SqlServer => format!("SELECT TOP 1 1 FROM {quoted}"),
        }
    }
}

/// Raw catalog SQL primitive provided by the database driver.
///
/// Implementations bind `params` positionally and must not interpret them as
/// SQL text.
#[async_trait]
pub trait CatalogQuery: Send + Sync {
    /// Dialect used to render catalog SQL.
    fn dialect(&self) -> Dialect;

    /// Execute a query returning a single integer.
    async fn query_count(&self, sql: &str, params: &[String]) -> DbResult<i64>;

    /// Execute a query returning one text column.
    async fn query_names(&self, sql: &str, params: &[String]) -> DbResult<Vec<String>>;

    /// Execute a query and discard its rows.
    async fn execute_probe(&self, sql: &str) -> DbResult<()>;
}

/// Observed physical state of one table. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableExistenceFact {
    pub table: String,
    pub exists: bool,
    /// A table can exist and still be unreadable (permissions).
    pub queryable: bool,
}

/// Read-only catalog probes over a [`CatalogQuery`].
pub struct CatalogProber<'a, Q: ?Sized> {
    catalog: &'a Q,
}

impl<'a, Q: CatalogQuery + ?Sized> CatalogProber<'a, Q> {
    pub const fn new(catalog: &'a Q) -> Self {
        Self { catalog }
    }

    /// Does `name` exist? `false` for invalid names and on any error.
    pub async fn table_exists(&self, name: &str) -> bool {
        let Ok(table) = TableName::parse(name) else {
            debug!(table = name, "Rejected invalid table name before querying");
            return false;
        };
        self.try_table_exists(&table).await.unwrap_or_else(|e| {
            debug!(table = name, error = %e, "Existence probe failed");
            false
        })
    }

    /// Can `name` be read? `false` for invalid names and on any error.
    pub async fn table_is_queryable(&self, name: &str) -> bool {
        let Ok(table) = TableName::parse(name) else {
            debug!(table = name, "Rejected invalid table name before querying");
            return false;
        };
        self.try_table_is_queryable(&table).await.is_ok()
    }

    /// Existence of many tables with one round-trip.
    ///
    /// Invalid names map to `false` and are left out of the query. On error
    /// every name maps to `false`.
    pub async fn table_existence_batch(&self, names: &[&str]) -> BTreeMap<String, bool> {
        let valid: Vec<TableName> = names
            .iter()
            .filter_map(|n| TableName::parse(n).ok())
            .collect();
        let found = self
            .try_table_existence_batch(&valid)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "Batch existence probe failed");
                BTreeMap::new()
            });

        names
            .iter()
            .map(|n| {
                let exists = TableName::parse(n)
                    .ok()
                    .and_then(|t| found.get(&t).copied())
                    .unwrap_or(false);
                ((*n).to_string(), exists)
            })
            .collect()
    }

    /// Existence and queryability of one table.
    pub async fn table_fact(&self, name: &str) -> TableExistenceFact {
        let exists = self.table_exists(name).await;
        let queryable = exists && self.table_is_queryable(name).await;
        TableExistenceFact {
            table: name.to_string(),
            exists,
            queryable,
        }
    }

    /// Existence of one validated table, surfacing driver errors.
    pub async fn try_table_exists(&self, table: &TableName) -> DbResult<bool> {
        let sql = self.catalog.dialect().table_count_sql();
        let count = self
            .catalog
            .query_count(&sql, &[table.to_string()])
            .await?;
        Ok(count > 0)
    }

    /// Bounded read of one validated table, surfacing driver errors.
    pub async fn try_table_is_queryable(&self, table: &TableName) -> DbResult<()> {
        let sql = self.catalog.dialect().probe_sql(table);
        self.catalog.execute_probe(&sql).await
    }

    /// Existence of validated tables with one `IN (...)` query.
    ///
    /// An empty input issues no query. Catalog names match ignoring ASCII
    /// case, as table names do in `SQLite` and default SQL Server collations.
    pub async fn try_table_existence_batch(
        &self,
        tables: &[TableName],
    ) -> DbResult<BTreeMap<TableName, bool>> {
        let unique: Vec<&TableName> = tables.iter().unique().collect();
        if unique.is_empty() {
            return Ok(BTreeMap::new());
        }

        let sql = self.catalog.dialect().table_names_sql(unique.len());
        let params: Vec<String> = unique.iter().map(ToString::to_string).collect();
        let present = self.catalog.query_names(&sql, &params).await?;

        Ok(unique
            .into_iter()
            .map(|t| {
                let exists = present.iter().any(|p| p.eq_ignore_ascii_case(t.as_str()));
                (t.clone(), exists)
            })
            .collect())
    }
}
