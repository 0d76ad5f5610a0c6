//! CLI configuration, loadable from YAML

use esql_dsl::QuerySettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "esql.yml";

/// Complete CLI configuration - can be loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    /// Translator settings
    pub query: QuerySettings,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Include target in logs
    pub show_target: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            show_target: false,
        }
    }
}

impl CliConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: CliConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Write default config to a file (for generating example config)
    pub fn write_default(path: impl AsRef<Path>) -> anyhow::Result<()> {
        let config = Self::default();
        let yaml = serde_yaml::to_string(&config)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn log_filter(&self) -> String {
        match self.logging.level.to_lowercase().as_str() {
            level @ ("trace" | "debug" | "info" | "warn" | "error") => level.to_string(),
            _ => "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("esql.yml");

        CliConfig::write_default(&path).unwrap();
        let loaded = CliConfig::from_file(&path).unwrap();

        assert_eq!(loaded, CliConfig::default());
        assert_eq!(loaded.query.page_size, 1000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("esql.yml");
        std::fs::write(
            &path,
            "query:\n  compatibility_mode: true\n  allowed_columns: [colA, colB]\n  column_aliases:\n    colA: attr.a\nlogging:\n  level: DEBUG\n",
        )
        .unwrap();

        let config = CliConfig::from_file(&path).unwrap();
        assert!(config.query.compatibility_mode);
        assert_eq!(config.query.bucket_count, 1000);
        assert_eq!(config.query.allowed_columns, vec!["colA", "colB"]);
        assert_eq!(config.log_filter(), "debug");

        let query = config.query.into_config();
        assert_eq!(query.column("colA").unwrap(), "attr.a");
        assert!(query.column("colC").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(CliConfig::from_file(dir.path().join("absent.yml")).is_err());
    }

    #[test]
    fn test_unknown_level_falls_back() {
        let mut config = CliConfig::default();
        config.logging.level = "loud".to_string();
        assert_eq!(config.log_filter(), "warn");
    }
}
