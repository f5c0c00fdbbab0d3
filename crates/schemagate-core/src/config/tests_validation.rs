//! Validation-focused tests for configuration
//!
//! Range checks, identifier allow-list and runtime conversions.

#[cfg(test)]
mod validation_tests {
    use std::{path::Path, time::Duration};

    use crate::{
        config::{AppConfig, DEFAULT_CRITICAL_TABLES},
        policy::ExecutionContext,
        Error,
    };

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.environment, ExecutionContext::Production);
        assert_eq!(config.database.critical_tables.len(), DEFAULT_CRITICAL_TABLES.len());
    }

    #[test]
    fn test_empty_url_rejected() {
        let mut config = AppConfig::default();
        config.database.url = "   ".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_timeout_zero_rejected() {
        let mut config = AppConfig::default();
        config.database.command_timeout_secs = 0;
        let result = config.validate();
        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("between 1 and 300"));
        }
    }

    #[test]
    fn test_timeout_too_high_rejected() {
        let mut config = AppConfig::default();
        config.database.command_timeout_secs = 301;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_bounds_accepted() {
        let mut config = AppConfig::default();
        config.database.command_timeout_secs = 1;
        assert!(config.validate().is_ok());
        config.database.command_timeout_secs = 300;
        assert!(config.validate().is_ok());
        assert_eq!(config.command_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_no_critical_tables_rejected() {
        let mut config = AppConfig::default();
        config.database.critical_tables.clear();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_injection_shaped_table_rejected() {
        let mut config = AppConfig::default();
        config.database.critical_tables = vec!["Pages".to_string(), "x]; DROP TABLE y".to_string()];
        let result = config.validate();
        assert!(matches!(result, Err(Error::InvalidIdentifier(ref name)) if name == "x]; DROP TABLE y"));
    }

    #[test]
    fn test_bad_bind_addr_rejected() {
        let mut config = AppConfig::default();
        config.server.bind_addr = "localhost".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_sequencer_config_carries_settings() {
        let mut config = AppConfig::default();
        config.environment = ExecutionContext::Testing;
        config.database.auto_apply_migrations = false;

        let seq = config.sequencer_config(None);
        assert!(seq.is_ok());
        if let Ok(seq) = seq {
            assert_eq!(seq.execution_context, ExecutionContext::Testing);
            assert!(!seq.auto_apply_migrations);
            assert_eq!(seq.critical_tables.len(), 5);
            assert_eq!(seq.migrate_command, "schemagate migrate");
        }
    }

    #[test]
    fn test_sequencer_config_quotes_config_path() {
        let config = AppConfig::default();
        let seq = config.sequencer_config(Some(Path::new("/etc/cms/schemagate.toml")));
        assert!(seq.is_ok_and(
            |s| s.migrate_command == "schemagate migrate --config /etc/cms/schemagate.toml"
        ));
    }
}
