//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: `<config_dir>/schemagate/config.toml`
//! 3. Project config: `./schemagate.toml` (or an explicit `--config` path)
//! 4. Environment variables: `SCHEMAGATE_*`
//!
//! # Example Config
//!
//! ```toml
//! environment = "Production"
//!
//! [database]
//! url = "sqlite://schemagate.db"
//! auto_apply_migrations = true
//! command_timeout_secs = 30
//! critical_tables = ["AspNetUsers", "AspNetRoles", "Sites", "Pages", "Themes"]
//!
//! [server]
//! bind_addr = "127.0.0.1:8080"
//! ```
//!
//! # Module Structure
//!
//! - `types`: Configuration structure definitions
//! - `defaults`: Default value implementations
//! - `load`: Loading from files and environment
//! - `validate`: Validation and conversion into runtime settings

mod defaults;
mod load;
mod types;
mod validate;

#[cfg(test)]
mod tests_loading;
#[cfg(test)]
mod tests_validation;

pub use defaults::DEFAULT_CRITICAL_TABLES;
pub use load::{
    global_config_path, load_config, load_toml_table, merge_tables, project_config_path,
    ENV_AUTO_APPLY_MIGRATIONS, ENV_BIND_ADDR, ENV_COMMAND_TIMEOUT_SECS, ENV_DATABASE_URL,
    ENV_ENVIRONMENT,
};
pub use types::{AppConfig, DatabaseConfig, ServerConfig};
