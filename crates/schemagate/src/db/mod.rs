//! SQLite driver adapter using `SQLx`
//!
//! [`SqliteDatabase`] provides the three primitives the sequencer consumes:
//! - connection opening ([`Connector`])
//! - the migration framework ([`MigrationBackend`]) over `__MigrationHistory`
//! - raw catalog queries ([`CatalogQuery`])
//!
//! The pool is lazy, so the first real connection happens inside the
//! connectivity probe. Timeouts are the driver's: the command timeout
//! becomes the pool acquire timeout and the SQLite busy timeout.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemagate_core::{
    CatalogQuery, Connector, DatabaseConfig, DbError, DbResult, Dialect, Error, MigrationBackend,
    MigrationRecord, Result,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::debug;

pub mod migrations;

pub use migrations::{migration_set, Migration, MIGRATIONS};

/// Migration history table owned by the adapter.
pub const HISTORY_TABLE: &str = "__MigrationHistory";

const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS "__MigrationHistory" (
    "MigrationId" TEXT PRIMARY KEY NOT NULL,
    "ProductVersion" TEXT NOT NULL,
    "AppliedAt" TEXT NOT NULL
)"#;

const INSERT_HISTORY: &str = r#"
INSERT INTO "__MigrationHistory" ("MigrationId", "ProductVersion", "AppliedAt")
VALUES (?, ?, ?)
ON CONFLICT ("MigrationId") DO NOTHING"#;

const SELECT_HISTORY: &str = r#"
SELECT "MigrationId", "ProductVersion", "AppliedAt"
FROM "__MigrationHistory"
ORDER BY "MigrationId""#;

/// `SQLite` database behind a connection pool
#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
    migrations: &'static [Migration],
}

impl SqliteDatabase {
    /// Build a lazy pool for the configured database.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the URL is not a `SQLite` URL.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::connect_with(config, MIGRATIONS)
    }

    /// Same as [`Self::connect`] with an explicit migration plan.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the URL is not a `SQLite` URL.
    pub fn connect_with(config: &DatabaseConfig, migrations: &'static [Migration]) -> Result<Self> {
        if !config.url.starts_with("sqlite:") {
            return Err(Error::invalid_config(format!(
                "Unsupported database url '{}': expected a sqlite: url",
                config.url
            )));
        }
        let timeout = Duration::from_secs(config.command_timeout_secs);
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| Error::invalid_config(format!("Invalid database url '{}': {e}", config.url)))?
            .create_if_missing(true)
            .busy_timeout(timeout);

        // Every connection to `:memory:` is a separate database.
        let in_memory = config.url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .acquire_timeout(timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(options);

        Ok(Self { pool, migrations })
    }

    /// Execute arbitrary SQL outside the migration plan.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    pub async fn execute_script(&self, sql: &str) -> DbResult<()> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| to_db_error(&e))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_history_table(&self) -> DbResult<()> {
        self.execute_script(CREATE_HISTORY_TABLE).await
    }

    async fn history_table_exists(&self) -> DbResult<bool> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(HISTORY_TABLE)
        .fetch_one(&self.pool)
        .await
        .map(|count| count > 0)
        .map_err(|e| to_db_error(&e))
    }
}

/// Map a `SQLx` error into the driver-neutral [`DbError`].
pub fn to_db_error(err: &sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            match db_err.code().and_then(|code| code.parse::<i32>().ok()) {
                Some(code) => DbError::sqlite(code, message),
                None => DbError::new(message),
            }
        }
        sqlx::Error::PoolTimedOut => {
            DbError::new("timeout expired while waiting for a database connection")
        }
        other => DbError::new(other.to_string()),
    }
}

fn parse_applied_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[async_trait]
impl Connector for SqliteDatabase {
    async fn open(&self) -> DbResult<()> {
        self.pool
            .acquire()
            .await
            .map(drop)
            .map_err(|e| to_db_error(&e))
    }
}

#[async_trait]
impl MigrationBackend for SqliteDatabase {
    async fn known_migrations(&self) -> DbResult<Vec<String>> {
        Ok(self.migrations.iter().map(|m| m.id.to_string()).collect())
    }

    async fn history(&self) -> DbResult<Vec<MigrationRecord>> {
        if !self.history_table_exists().await? {
            return Ok(Vec::new());
        }
        let rows: Vec<(String, String, String)> = sqlx::query_as(SELECT_HISTORY)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| to_db_error(&e))?;

        Ok(rows
            .into_iter()
            .map(|(migration_id, product_version, applied_at)| MigrationRecord {
                migration_id,
                applied: true,
                product_version,
                applied_at: parse_applied_at(&applied_at),
            })
            .collect())
    }

    async fn apply_migration(&self, migration_id: &str) -> DbResult<()> {
        let script = self
            .migrations
            .iter()
            .find(|m| m.id == migration_id)
            .map(|m| m.script)
            .ok_or_else(|| DbError::new(format!("unknown migration {migration_id}")))?;

        self.ensure_history_table().await?;
        let record = MigrationRecord::applied_now(migration_id);

        let mut tx = self.pool.begin().await.map_err(|e| to_db_error(&e))?;
        sqlx::query(script)
            .execute(&mut *tx)
            .await
            .map_err(|e| to_db_error(&e))?;
        insert_history_row(&mut tx, &record).await?;
        tx.commit().await.map_err(|e| to_db_error(&e))?;

        debug!(migration_id, "Migration DDL committed");
        Ok(())
    }

    async fn insert_history(&self, record: &MigrationRecord) -> DbResult<()> {
        self.ensure_history_table().await?;
        let mut tx = self.pool.begin().await.map_err(|e| to_db_error(&e))?;
        insert_history_row(&mut tx, record).await?;
        tx.commit().await.map_err(|e| to_db_error(&e))
    }
}

async fn insert_history_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    record: &MigrationRecord,
) -> DbResult<()> {
    let applied_at = record.applied_at.unwrap_or_else(Utc::now).to_rfc3339();
    sqlx::query(INSERT_HISTORY)
        .bind(&record.migration_id)
        .bind(&record.product_version)
        .bind(applied_at)
        .execute(&mut **tx)
        .await
        .map(|_| ())
        .map_err(|e| to_db_error(&e))
}

#[async_trait]
impl CatalogQuery for SqliteDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn query_count(&self, sql: &str, params: &[String]) -> DbResult<i64> {
        params
            .iter()
            .fold(sqlx::query_scalar::<_, i64>(sql), |q, p| q.bind(p.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| to_db_error(&e))
    }

    async fn query_names(&self, sql: &str, params: &[String]) -> DbResult<Vec<String>> {
        params
            .iter()
            .fold(sqlx::query_scalar::<_, String>(sql), |q, p| q.bind(p.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| to_db_error(&e))
    }

    async fn execute_probe(&self, sql: &str) -> DbResult<()> {
        sqlx::query(sql)
            .fetch_optional(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| to_db_error(&e))
    }
}
