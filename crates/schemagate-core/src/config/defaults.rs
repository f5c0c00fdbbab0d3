//! Default configuration values

use super::types::{AppConfig, DatabaseConfig, ServerConfig};
use crate::policy::ExecutionContext;

/// Identity tables plus the core CMS tables.
pub const DEFAULT_CRITICAL_TABLES: &[&str] =
    &["AspNetUsers", "AspNetRoles", "Sites", "Pages", "Themes"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: ExecutionContext::Production,
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://schemagate.db".to_string(),
            auto_apply_migrations: true,
            command_timeout_secs: 30,
            critical_tables: DEFAULT_CRITICAL_TABLES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}
