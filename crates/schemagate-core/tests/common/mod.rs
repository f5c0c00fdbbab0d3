//! Scripted in-memory database shared by the integration tests.
//!
//! Physical tables and history rows are tracked separately so drift
//! (tables present, history missing) can be staged directly. Applying a
//! migration creates its tables and fails with a duplicate-object error if
//! any of them already exists.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use schemagate_core::{
    CatalogQuery, Connector, DbError, DbResult, Dialect, MigrationBackend, MigrationDescriptor,
    MigrationRecord, MigrationSet, TableName,
};

pub const INITIAL_CREATE: &str = "20240101000000_InitialCreate";
pub const ADD_IDENTITY: &str = "20240115000000_AddIdentity";
pub const ADD_THEMES: &str = "20240201000000_AddThemes";
pub const ADD_BILLING: &str = "20240301000000_AddBilling";
pub const ADD_PAGE_VERSIONS: &str = "20240401000000_AddPageVersions";

/// Migration id → tables it creates.
pub const CMS_PLAN: &[(&str, &[&str])] = &[
    (INITIAL_CREATE, &["Sites", "Pages", "Modules"]),
    (ADD_IDENTITY, &["AspNetUsers", "AspNetRoles", "AspNetUserRoles"]),
    (ADD_THEMES, &["Themes"]),
    (ADD_BILLING, &["Subscriptions", "Invoices"]),
    (ADD_PAGE_VERSIONS, &["PageVersions"]),
];

/// Tables created by the first three migrations.
pub const FIRST_THREE_TABLES: &[&str] = &[
    "Sites",
    "Pages",
    "Modules",
    "AspNetUsers",
    "AspNetRoles",
    "AspNetUserRoles",
    "Themes",
];

pub const CRITICAL: &[&str] = &["AspNetUsers", "AspNetRoles", "Sites", "Pages", "Themes"];

pub fn cms_plan() -> MigrationSet {
    MigrationSet::new(
        CMS_PLAN
            .iter()
            .map(|(id, tables)| MigrationDescriptor::new(*id, tables).expect("valid descriptor"))
            .collect(),
    )
    .expect("ordered plan")
}

pub fn critical_tables() -> Vec<TableName> {
    CRITICAL
        .iter()
        .map(|t| TableName::parse(t).expect("valid table"))
        .collect()
}

pub fn transient() -> DbError {
    DbError::sql_server(
        40613,
        "Database 'cms' on server 'prod' is not currently available. Please retry the connection later.",
    )
}

pub fn login_failed() -> DbError {
    DbError::sql_server(18456, "Login failed for user 'cms'.")
}

pub fn duplicate_object(table: &str) -> DbError {
    DbError::sql_server(
        2714,
        format!("There is already an object named '{table}' in the database."),
    )
}

#[derive(Default)]
struct State {
    plan: Vec<(String, Vec<String>)>,
    tables: BTreeSet<String>,
    history: Vec<MigrationRecord>,
    open_failures: VecDeque<DbError>,
    history_failure: Option<DbError>,
    catalog_failure: Option<DbError>,
    apply_failures: HashMap<String, DbError>,
    probe_failures: HashMap<String, DbError>,
    executed: Vec<String>,
}

pub struct FakeDb {
    state: Mutex<State>,
    queries: AtomicUsize,
}

impl FakeDb {
    /// Empty database that knows the CMS plan.
    pub fn new() -> Self {
        Self::with_plan(CMS_PLAN)
    }

    pub fn with_plan(plan: &[(&str, &[&str])]) -> Self {
        let state = State {
            plan: plan
                .iter()
                .map(|(id, tables)| {
                    (
                        (*id).to_string(),
                        tables.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect(),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
            queries: AtomicUsize::new(0),
        }
    }

    /// Every migration applied: tables and history.
    pub fn migrated() -> Self {
        let db = Self::new();
        for (id, tables) in CMS_PLAN {
            db.create_tables(tables);
            db.record_history(id);
        }
        db
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake db lock")
    }

    pub fn create_tables(&self, tables: &[&str]) {
        self.lock()
            .tables
            .extend(tables.iter().map(ToString::to_string));
    }

    pub fn drop_table(&self, table: &str) {
        self.lock().tables.remove(table);
    }

    pub fn record_history(&self, id: &str) {
        self.lock().history.push(MigrationRecord::applied_now(id));
    }

    /// Fail the next `open()` calls, one error per call.
    pub fn fail_open(&self, error: DbError) {
        self.lock().open_failures.push_back(error);
    }

    pub fn fail_history(&self, error: DbError) {
        self.lock().history_failure = Some(error);
    }

    pub fn fail_catalog(&self, error: DbError) {
        self.lock().catalog_failure = Some(error);
    }

    pub fn heal_catalog(&self) {
        self.lock().catalog_failure = None;
    }

    pub fn fail_apply(&self, id: &str, error: DbError) {
        self.lock().apply_failures.insert(id.to_string(), error);
    }

    pub fn fail_probe(&self, table: &str, error: DbError) {
        self.lock().probe_failures.insert(table.to_string(), error);
    }

    /// Catalog round-trips issued so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Migrations whose DDL ran, in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub fn history_ids(&self) -> Vec<String> {
        self.lock()
            .history
            .iter()
            .map(|r| r.migration_id.clone())
            .collect()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains(table)
    }

    fn count_query(&self) -> DbResult<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.lock().catalog_failure.clone().map_or(Ok(()), Err)
    }
}

impl Default for FakeDb {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for FakeDb {
    async fn open(&self) -> DbResult<()> {
        self.lock().open_failures.pop_front().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl MigrationBackend for FakeDb {
    async fn known_migrations(&self) -> DbResult<Vec<String>> {
        Ok(self.lock().plan.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn history(&self) -> DbResult<Vec<MigrationRecord>> {
        let state = self.lock();
        state
            .history_failure
            .clone()
            .map_or_else(|| Ok(state.history.clone()), Err)
    }

    async fn apply_migration(&self, migration_id: &str) -> DbResult<()> {
        let mut state = self.lock();
        if let Some(error) = state.apply_failures.get(migration_id) {
            return Err(error.clone());
        }
        let tables = state
            .plan
            .iter()
            .find(|(id, _)| id == migration_id)
            .map(|(_, tables)| tables.clone())
            .ok_or_else(|| DbError::new(format!("unknown migration {migration_id}")))?;
        if let Some(existing) = tables.iter().find(|t| state.tables.contains(*t)) {
            return Err(duplicate_object(existing));
        }
        state.tables.extend(tables);
        state.history.push(MigrationRecord::applied_now(migration_id));
        state.executed.push(migration_id.to_string());
        Ok(())
    }

    async fn insert_history(&self, record: &MigrationRecord) -> DbResult<()> {
        let mut state = self.lock();
        if !state
            .history
            .iter()
            .any(|r| r.migration_id == record.migration_id)
        {
            state.history.push(record.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogQuery for FakeDb {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    async fn query_count(&self, _sql: &str, params: &[String]) -> DbResult<i64> {
        self.count_query()?;
        let state = self.lock();
        Ok(params
            .first()
            .map_or(0, |t| i64::from(state.tables.contains(t))))
    }

    async fn query_names(&self, _sql: &str, params: &[String]) -> DbResult<Vec<String>> {
        self.count_query()?;
        let state = self.lock();
        Ok(params
            .iter()
            .filter(|t| state.tables.contains(*t))
            .cloned()
            .collect())
    }

    async fn execute_probe(&self, sql: &str) -> DbResult<()> {
        self.count_query()?;
        let table = sql
            .split_once('[')
            .and_then(|(_, rest)| rest.split_once(']'))
            .map(|(name, _)| name.to_string())
            .unwrap_or_default();
        let state = self.lock();
        if let Some(error) = state.probe_failures.get(&table) {
            return Err(error.clone());
        }
        if state.tables.contains(&table) {
            Ok(())
        } else {
            Err(DbError::sql_server(208, format!("Invalid object name '{table}'.")))
        }
    }
}
