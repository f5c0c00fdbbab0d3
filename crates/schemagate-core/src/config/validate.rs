//! Configuration validation and conversion into runtime settings

use std::{net::SocketAddr, path::Path, time::Duration};

use super::types::AppConfig;
use crate::{
    identifier::TableName, readiness::DEFAULT_MIGRATE_COMMAND, sequencer::SequencerConfig, Error,
    Result,
};

const MIN_COMMAND_TIMEOUT_SECS: u64 = 1;
const MAX_COMMAND_TIMEOUT_SECS: u64 = 300;

impl AppConfig {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `database.url` is empty
    /// - `database.command_timeout_secs` is outside 1..=300
    /// - `database.critical_tables` is empty or holds an invalid identifier
    /// - `server.bind_addr` is not a socket address
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(Error::invalid_config("database.url must not be empty"));
        }

        let timeout = self.database.command_timeout_secs;
        if !(MIN_COMMAND_TIMEOUT_SECS..=MAX_COMMAND_TIMEOUT_SECS).contains(&timeout) {
            return Err(Error::invalid_config(format!(
                "database.command_timeout_secs must be between {MIN_COMMAND_TIMEOUT_SECS} and {MAX_COMMAND_TIMEOUT_SECS}, got {timeout}"
            )));
        }

        if self.database.critical_tables.is_empty() {
            return Err(Error::invalid_config(
                "database.critical_tables must name at least one table",
            ));
        }
        self.critical_tables()?;
        self.bind_addr()?;
        Ok(())
    }

    /// Critical tables as validated identifiers
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIdentifier` for the first rejected name
    pub fn critical_tables(&self) -> Result<Vec<TableName>> {
        self.database
            .critical_tables
            .iter()
            .map(|name| TableName::parse(name))
            .collect()
    }

    /// Sequencer settings derived from this configuration
    ///
    /// `config_path` is echoed in the remediation command so operators can
    /// copy it verbatim.
    ///
    /// # Errors
    ///
    /// Returns error if a critical table name is invalid
    pub fn sequencer_config(&self, config_path: Option<&Path>) -> Result<SequencerConfig> {
        let migrate_command = config_path.map_or_else(
            || DEFAULT_MIGRATE_COMMAND.to_string(),
            |path| format!("{DEFAULT_MIGRATE_COMMAND} --config {}", path.display()),
        );
        Ok(SequencerConfig {
            execution_context: self.environment,
            auto_apply_migrations: self.database.auto_apply_migrations,
            critical_tables: self.critical_tables()?,
            migrate_command,
        })
    }

    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.database.command_timeout_secs)
    }

    /// # Errors
    ///
    /// Returns error if `server.bind_addr` does not parse
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind_addr.parse().map_err(|e| {
            Error::invalid_config(format!(
                "server.bind_addr '{}' is not a socket address: {e}",
                self.server.bind_addr
            ))
        })
    }
}
