//! Configuration loading from files and environment (Immutable functional pattern)
//!
//! Files are merged as TOML tables before deserializing, so a key missing
//! from the project file keeps the global file's value instead of falling
//! back to the built-in default.

use std::path::{Path, PathBuf};

use super::types::AppConfig;
use crate::{Error, Result};

pub const ENV_ENVIRONMENT: &str = "SCHEMAGATE_ENVIRONMENT";
pub const ENV_DATABASE_URL: &str = "SCHEMAGATE_DATABASE_URL";
pub const ENV_AUTO_APPLY_MIGRATIONS: &str = "SCHEMAGATE_AUTO_APPLY_MIGRATIONS";
pub const ENV_COMMAND_TIMEOUT_SECS: &str = "SCHEMAGATE_COMMAND_TIMEOUT_SECS";
pub const ENV_BIND_ADDR: &str = "SCHEMAGATE_BIND_ADDR";

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

/// Load configuration from all sources with hierarchy
///
/// `explicit` replaces the project config path and must exist.
///
/// # Errors
///
/// Returns error if:
/// - An explicit config path does not exist
/// - A config file is malformed TOML
/// - An environment variable has an invalid value
/// - Config values fail validation
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    // 1. Global config if exists
    let merged = match global_config_path() {
        Some(path) if path.is_file() => load_toml_table(&path)?,
        _ => toml::Table::new(),
    };

    // 2. Project (or explicit) config
    let merged = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::io_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            merge_tables(merged, load_toml_table(path)?)
        }
        None => {
            let project_path = project_config_path()?;
            if project_path.is_file() {
                merge_tables(merged, load_toml_table(&project_path)?)
            } else {
                merged
            }
        }
    };

    // 3. Defaults fill anything neither file set
    let config: AppConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| Error::parse_error(format!("Invalid config: {e}")))?;

    // 4. Environment variable overrides
    let config = config.apply_env_vars()?;

    // 5. Validate
    config.validate()?;
    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════
// PATH HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Get path to global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "schemagate")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}

/// Get path to project config file
///
/// # Errors
///
/// Returns error if current directory cannot be determined
pub fn project_config_path() -> Result<PathBuf> {
    std::env::current_dir()
        .map(|dir| dir.join("schemagate.toml"))
        .map_err(|e| Error::io_error(format!("Failed to get current directory: {e}")))
}

/// Load a TOML file as a table
///
/// # Errors
///
/// Returns error if:
/// - Path is a directory instead of a file
/// - File cannot be read
/// - TOML is malformed
pub fn load_toml_table(path: &Path) -> Result<toml::Table> {
    if path.is_dir() {
        return Err(Error::io_error(format!(
            "Config path is a directory, not a file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::io_error(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    content.parse::<toml::Table>().map_err(|e| {
        Error::parse_error(format!(
            "Failed to parse config file {}: {e}\n\
             \n\
             The config file contains invalid TOML syntax.",
            path.display()
        ))
    })
}

/// Deep-merge `overlay` into `base`; overlay wins on conflicts.
pub fn merge_tables(base: toml::Table, overlay: toml::Table) -> toml::Table {
    overlay.into_iter().fold(base, |mut acc, (key, value)| {
        let merged = match (acc.remove(&key), value) {
            (Some(toml::Value::Table(b)), toml::Value::Table(o)) => {
                toml::Value::Table(merge_tables(b, o))
            }
            (_, v) => v,
        };
        acc.insert(key, merged);
        acc
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// ENVIRONMENT VARIABLE OVERRIDES (Immutable pattern)
// ═══════════════════════════════════════════════════════════════════════════

impl AppConfig {
    /// Apply `SCHEMAGATE_*` environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if environment variable values are invalid
    pub fn apply_env_vars(self) -> Result<Self> {
        self.apply_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Returns error if a variable value cannot be parsed
    pub fn apply_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_ENVIRONMENT) {
            self.environment = value.parse().map_err(|_| {
                Error::invalid_config(format!(
                    "Invalid {ENV_ENVIRONMENT} value '{value}': expected Production, Development or Testing"
                ))
            })?;
        }

        if let Some(value) = lookup(ENV_DATABASE_URL) {
            self.database.url = value;
        }

        if let Some(value) = lookup(ENV_AUTO_APPLY_MIGRATIONS) {
            self.database.auto_apply_migrations = value.parse().map_err(|e| {
                Error::invalid_config(format!("Invalid {ENV_AUTO_APPLY_MIGRATIONS} value: {e}"))
            })?;
        }

        if let Some(value) = lookup(ENV_COMMAND_TIMEOUT_SECS) {
            self.database.command_timeout_secs = value.parse().map_err(|e| {
                Error::invalid_config(format!("Invalid {ENV_COMMAND_TIMEOUT_SECS} value: {e}"))
            })?;
        }

        if let Some(value) = lookup(ENV_BIND_ADDR) {
            self.server.bind_addr = value;
        }

        Ok(self)
    }
}
