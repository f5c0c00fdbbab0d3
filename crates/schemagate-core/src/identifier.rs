//! Allow-listed table identifiers.
//!
//! A [`TableName`] can only be constructed from `[A-Za-z0-9_]+`, so any value
//! of this type is safe to interpolate into diagnostic SQL.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[allow(clippy::unwrap_used)]
static TABLE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Check a raw name against the identifier allow-list.
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME_PATTERN.is_match(name)
}

/// A validated table name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Validate and wrap a table name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIdentifier` when `name` is empty or contains a
    /// character outside `[A-Za-z0-9_]`.
    pub fn parse(name: &str) -> Result<Self> {
        if is_valid_table_name(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(Error::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TableName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        if is_valid_table_name(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidIdentifier(value))
        }
    }
}

impl TryFrom<&str> for TableName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<TableName> for String {
    fn from(name: TableName) -> Self {
        name.0
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
