//! Loading-focused tests for configuration
//!
//! File parsing, table merging and environment overrides.

#[cfg(test)]
mod loading_tests {
    use std::{collections::HashMap, io::Write};

    use crate::{
        config::{
            load_config, load_toml_table, merge_tables, project_config_path, AppConfig,
            ENV_AUTO_APPLY_MIGRATIONS, ENV_BIND_ADDR, ENV_COMMAND_TIMEOUT_SECS, ENV_DATABASE_URL,
            ENV_ENVIRONMENT,
        },
        policy::ExecutionContext,
        Error, Result,
    };

    fn write_config(dir: &tempfile::TempDir, body: &str) -> Result<std::path::PathBuf> {
        let path = dir.path().join("schemagate.toml");
        let mut file = std::fs::File::create(&path)
            .map_err(|e| Error::io_error(format!("Failed to create test file: {e}")))?;
        file.write_all(body.as_bytes())
            .map_err(|e| Error::io_error(format!("Failed to write test file: {e}")))?;
        Ok(path)
    }

    fn temp_dir() -> Result<tempfile::TempDir> {
        tempfile::tempdir().map_err(|e| Error::io_error(format!("Failed to create temp dir: {e}")))
    }

    #[test]
    #[serial_test::serial]
    fn test_explicit_config_overrides_defaults() -> Result<()> {
        let dir = temp_dir()?;
        let path = write_config(
            &dir,
            r#"
environment = "Development"

[database]
url = "sqlite://cms.db"
auto_apply_migrations = false
"#,
        )?;

        let config = load_config(Some(&path))?;
        assert_eq!(config.environment, ExecutionContext::Development);
        assert_eq!(config.database.url, "sqlite://cms.db");
        assert!(!config.database.auto_apply_migrations);
        // Untouched keys keep their defaults
        assert_eq!(config.database.command_timeout_secs, 30);
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        Ok(())
    }

    #[test]
    fn test_missing_explicit_config_is_io_error() {
        let result = load_config(Some(std::path::Path::new("/nonexistent/schemagate.toml")));
        assert!(matches!(result, Err(Error::IoError(_))));
    }

    #[test]
    fn test_malformed_toml_returns_parse_error() -> Result<()> {
        let dir = temp_dir()?;
        let path = write_config(&dir, "database = \n invalid toml [[[")?;

        let result = load_toml_table(&path);
        assert!(matches!(result, Err(Error::ParseError(_))));
        Ok(())
    }

    #[test]
    fn test_directory_is_rejected() -> Result<()> {
        let dir = temp_dir()?;
        let result = load_toml_table(dir.path());
        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("directory"));
        }
        Ok(())
    }

    #[test]
    fn test_wrong_value_type_is_parse_error() -> Result<()> {
        let dir = temp_dir()?;
        let path = write_config(&dir, "[database]\ncommand_timeout_secs = \"thirty\"\n")?;
        let result = load_config(Some(&path));
        assert!(matches!(result, Err(Error::ParseError(_))));
        Ok(())
    }

    #[test]
    fn test_invalid_values_fail_validation() -> Result<()> {
        let dir = temp_dir()?;
        let path = write_config(&dir, "[database]\ncritical_tables = [\"Users; DROP\"]\n")?;
        let result = load_config(Some(&path));
        assert!(matches!(result, Err(Error::InvalidIdentifier(_))));
        Ok(())
    }

    #[test]
    fn test_merge_tables_is_deep() -> Result<()> {
        let base: toml::Table = "[database]\nurl = \"sqlite://global.db\"\ncommand_timeout_secs = 60\n"
            .parse()
            .map_err(|e| Error::parse_error(format!("{e}")))?;
        let overlay: toml::Table = "[database]\nurl = \"sqlite://project.db\"\n"
            .parse()
            .map_err(|e| Error::parse_error(format!("{e}")))?;

        let merged = merge_tables(base, overlay);
        let config: AppConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| Error::parse_error(format!("{e}")))?;
        assert_eq!(config.database.url, "sqlite://project.db");
        assert_eq!(config.database.command_timeout_secs, 60);
        Ok(())
    }

    #[test]
    fn test_project_config_path() {
        let result = project_config_path();
        assert!(result.is_ok_and(|p| p.ends_with("schemagate.toml")));
    }

    #[test]
    fn test_env_overrides_apply() -> Result<()> {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_ENVIRONMENT, "testing"),
            (ENV_DATABASE_URL, "sqlite::memory:"),
            (ENV_AUTO_APPLY_MIGRATIONS, "false"),
            (ENV_COMMAND_TIMEOUT_SECS, "5"),
            (ENV_BIND_ADDR, "0.0.0.0:9000"),
        ]);
        let config = AppConfig::default()
            .apply_env_overrides(|key| vars.get(key).map(ToString::to_string))?;

        assert_eq!(config.environment, ExecutionContext::Testing);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert!(!config.database.auto_apply_migrations);
        assert_eq!(config.database.command_timeout_secs, 5);
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        Ok(())
    }

    #[test]
    fn test_env_override_rejects_unknown_environment() {
        let result = AppConfig::default().apply_env_overrides(|key| {
            (key == ENV_ENVIRONMENT).then(|| "staging".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_env_override_rejects_non_boolean() {
        let result = AppConfig::default().apply_env_overrides(|key| {
            (key == ENV_AUTO_APPLY_MIGRATIONS).then(|| "yes".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_no_overrides_is_identity() -> Result<()> {
        let config = AppConfig::default().apply_env_overrides(|_| None)?;
        assert_eq!(config, AppConfig::default());
        Ok(())
    }

    #[test]
    #[serial_test::serial]
    fn test_process_environment_is_read() -> Result<()> {
        std::env::set_var(ENV_COMMAND_TIMEOUT_SECS, "45");
        let result = AppConfig::default().apply_env_vars();
        std::env::remove_var(ENV_COMMAND_TIMEOUT_SECS);

        assert_eq!(result?.database.command_timeout_secs, 45);
        Ok(())
    }
}
