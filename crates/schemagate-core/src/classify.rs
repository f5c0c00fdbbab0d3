//! Failure classification for database errors.
//!
//! Pure functions only: no database is needed to exercise this module.
//! Provider codes are checked first; message substrings (case-insensitive)
//! are the fallback for drivers that don't expose a code or report a generic
//! one. Anything unrecognized is [`FailureClass::Fatal`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{DbError, ProviderCode};

/// Classification of a database failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum FailureClass {
    /// Temporary unavailability; not the caller's fault
    Transient,
    /// Object already exists; reconcilable automatically
    SchemaConflict,
    /// Referenced object does not exist; fixed by applying migrations
    MissingObject,
    /// Needs human intervention
    Fatal,
}

/// SQL Server / Azure SQL error numbers treated as transient.
///
/// Connection timeouts, throttling, paused/failing-over databases and
/// transport resets.
pub const SQL_SERVER_TRANSIENT_CODES: &[i32] = &[
    -2, 20, 64, 233, 1205, 4060, 4221, 10053, 10054, 10060, 10928, 10929, 40143, 40197, 40501,
    40540, 40613, 49918, 49919, 49920,
];

/// SQL Server error numbers meaning "object already exists".
pub const SQL_SERVER_CONFLICT_CODES: &[i32] = &[1913, 2714];

/// SQL Server error numbers meaning "object does not exist".
pub const SQL_SERVER_MISSING_CODES: &[i32] = &[208];

/// SQLite result codes treated as transient (`SQLITE_BUSY`, `SQLITE_LOCKED`
/// and their extended variants).
pub const SQLITE_TRANSIENT_CODES: &[i32] = &[5, 6, 261, 262, 517];

const TRANSIENT_MESSAGES: &[&str] = &[
    "not currently available",
    "service is busy",
    "service is currently busy",
    "timeout expired",
    "login timeout",
    "connection timed out",
    "operation timed out",
    "database is locked",
    "database is busy",
    "transport-level error",
];

const CONFLICT_MESSAGES: &[&str] = &["already an object named", "already exists"];

const MISSING_MESSAGES: &[&str] = &["invalid object name", "no such table"];

/// Classify a driver error.
///
/// Order: recognized provider code, then message fallback, then `Fatal`.
pub fn classify(error: &DbError) -> FailureClass {
    error
        .code
        .and_then(classify_code)
        .or_else(|| classify_message(&error.message))
        .unwrap_or(FailureClass::Fatal)
}

/// Classify a provider code alone. `None` when the code is not recognized.
pub fn classify_code(code: ProviderCode) -> Option<FailureClass> {
    match code {
        ProviderCode::SqlServer(n) if SQL_SERVER_TRANSIENT_CODES.contains(&n) => {
            Some(FailureClass::Transient)
        }
        ProviderCode::SqlServer(n) if SQL_SERVER_CONFLICT_CODES.contains(&n) => {
            Some(FailureClass::SchemaConflict)
        }
        ProviderCode::SqlServer(n) if SQL_SERVER_MISSING_CODES.contains(&n) => {
            Some(FailureClass::MissingObject)
        }
        ProviderCode::Sqlite(n) if SQLITE_TRANSIENT_CODES.contains(&n) => {
            Some(FailureClass::Transient)
        }
        ProviderCode::SqlServer(_) | ProviderCode::Sqlite(_) => None,
    }
}

/// Classify by message text alone. `None` when nothing matches.
pub fn classify_message(message: &str) -> Option<FailureClass> {
    let lower = message.to_lowercase();
    let matches_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if matches_any(TRANSIENT_MESSAGES) {
        Some(FailureClass::Transient)
    } else if matches_any(CONFLICT_MESSAGES) {
        Some(FailureClass::SchemaConflict)
    } else if matches_any(MISSING_MESSAGES) {
        Some(FailureClass::MissingObject)
    } else {
        None
    }
}
