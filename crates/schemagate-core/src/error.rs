//! Error types for schemagate with categorization:
//!
//! - [`Error`]: crate-level failures (configuration, parsing, IO, invalid plans)
//! - [`DbError`]: a low-level driver error exactly as the database surfaced it
//! - [`ClassifiedError`]: the single failure the startup sequence propagates,
//!   carrying classification, remediation and the original driver error
//!
//! Exit code scheme (shared by all three):
//! - 1: User error (validation, invalid configuration)
//! - 2: System error (IO, transient database unavailability)
//! - 3: Not found (missing database objects)
//! - 4: Invalid state (schema conflicts, fatal database state)

use std::fmt;

use thiserror::Error;

use crate::{
    classify::FailureClass,
    readiness::ReadinessVerdict,
    sequencer::SequencerState,
};

/// Top-level error type for schemagate operations
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Filesystem access failed
    #[error("IO error: {0}")]
    IoError(String),

    /// Identifier rejected by the allow-list
    #[error("Invalid table name {0:?}: only letters, digits and underscore are allowed")]
    InvalidIdentifier(String),

    /// Compiled-in migration plan is inconsistent
    #[error("Invalid migration set: {0}")]
    InvalidMigrationSet(String),

    /// Startup sequence failed with a classified database error
    #[error(transparent)]
    Startup(#[from] ClassifiedError),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a parse error.
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an IO error.
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Returns the process exit code for this error.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig(_)
            | Self::ParseError(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidMigrationSet(_) => 1,
            Self::IoError(_) => 2,
            Self::Startup(err) => err.exit_code(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_error(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::parse_error(format!("Failed to parse config: {err}"))
    }
}

/// Result type alias for schemagate operations
pub type Result<T> = std::result::Result<T, Error>;

// ═══════════════════════════════════════════════════════════════════════════
// DRIVER ERRORS
// ═══════════════════════════════════════════════════════════════════════════

/// Provider-specific numeric error code.
///
/// Codes from different providers overlap numerically, so the provider is
/// part of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCode {
    /// SQL Server / Azure SQL error number (`SqlException.Number`)
    SqlServer(i32),
    /// SQLite primary or extended result code
    Sqlite(i32),
}

impl fmt::Display for ProviderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SqlServer(code) => write!(f, "SQL Server error {code}"),
            Self::Sqlite(code) => write!(f, "SQLite error {code}"),
        }
    }
}

/// Low-level database error as surfaced by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    /// Provider error code, when the driver exposes one
    pub code: Option<ProviderCode>,
    /// Driver message text
    pub message: String,
}

impl DbError {
    /// Error without a provider code (message-only).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// SQL Server error with its error number.
    pub fn sql_server(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(ProviderCode::SqlServer(code)),
            message: message.into(),
        }
    }

    /// SQLite error with its result code.
    pub fn sqlite(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(ProviderCode::Sqlite(code)),
            message: message.into(),
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DbError {}

/// Result type alias for driver round-trips
pub type DbResult<T> = std::result::Result<T, DbError>;

// ═══════════════════════════════════════════════════════════════════════════
// CLASSIFIED STARTUP ERRORS
// ═══════════════════════════════════════════════════════════════════════════

/// A classified failure raised out of the startup sequence.
#[derive(Debug, Clone, Error)]
#[error("{class} failure while {stage}: {source}")]
pub struct ClassifiedError {
    /// Failure classification
    pub class: FailureClass,
    /// Sequencer state in which the failure happened
    pub stage: SequencerState,
    /// Migration being applied or reconciled, if any
    pub migration_id: Option<String>,
    /// Operator-facing remediation text
    pub remediation: String,
    /// Original driver error
    pub source: DbError,
}

impl ClassifiedError {
    /// Build a classified error.
    pub fn new(
        class: FailureClass,
        stage: SequencerState,
        remediation: impl Into<String>,
        source: DbError,
    ) -> Self {
        Self {
            class,
            stage,
            migration_id: None,
            remediation: remediation.into(),
            source,
        }
    }

    /// Attach the migration the failure belongs to.
    #[must_use]
    pub fn for_migration(mut self, migration_id: impl Into<String>) -> Self {
        self.migration_id = Some(migration_id.into());
        self
    }

    /// Plain-language root cause for operator diagnostics.
    pub const fn root_cause(&self) -> &'static str {
        match self.class {
            FailureClass::Transient => {
                "The database is temporarily unavailable (timeout, throttling, or paused/busy server)."
            }
            FailureClass::SchemaConflict => {
                "Database objects already exist that the migration history does not record (schema drift)."
            }
            FailureClass::MissingObject => {
                "A required table or object does not exist: migrations have not been applied."
            }
            FailureClass::Fatal => {
                "The database rejected the operation (permissions, invalid SQL, or an unrecognized error)."
            }
        }
    }

    /// Blocked verdict describing this failure, without the driver message.
    pub fn to_verdict(&self) -> ReadinessVerdict {
        let reason = format!(
            "{} failure while {}: {}",
            self.class,
            self.stage,
            self.root_cause()
        );
        ReadinessVerdict::blocked(reason, Vec::new(), Vec::new(), &self.remediation)
    }

    /// Process exit code for this failure.
    pub const fn exit_code(&self) -> i32 {
        match self.class {
            FailureClass::Transient => 2,
            FailureClass::MissingObject => 3,
            FailureClass::SchemaConflict | FailureClass::Fatal => 4,
        }
    }
}
