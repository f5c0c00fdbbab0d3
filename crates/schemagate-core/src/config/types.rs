//! Configuration type definitions
//!
//! Pure data holders with derived traits; behavior lives in the sibling modules.

use serde::{Deserialize, Serialize};

use crate::policy::ExecutionContext;

/// Root configuration structure
///
/// Loaded from defaults → global → project → env vars
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub environment: ExecutionContext,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub auto_apply_migrations: bool,
    /// Connection acquire / command timeout handed to the driver
    pub command_timeout_secs: u64,
    pub critical_tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}
