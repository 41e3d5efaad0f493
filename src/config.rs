//! Application configuration.
//!
//! Loaded from YAML files and `LOYALTY__*` environment variables.

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "loyalty.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LOYALTY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "LOYALTY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "LOYALTY_LOG";

/// Default number of attempts for a ledger commit that keeps conflicting.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;
/// Default validity of points granted by privileges.
pub const DEFAULT_BENEFIT_VALIDITY_MONTHS: u32 = 12;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub log: LogConfig,
}

/// Ledger engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Attempts per operation when the store reports a conflicting write.
    ///
    /// Default: 3. Values below 1 are treated as 1.
    pub max_commit_attempts: u32,

    /// Months before points granted by a privilege expire.
    pub benefit_validity_months: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            benefit_validity_months: DEFAULT_BENEFIT_VALIDITY_MONTHS,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `LOYALTY_LOG` is not set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `loyalty.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `LOYALTY_CONFIG` environment variable (if set)
    /// 4. Environment variables with `LOYALTY__` prefix, e.g. `LOYALTY__LEDGER__MAX_COMMIT_ATTEMPTS`
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_that!(config.ledger.max_commit_attempts).is_equal_to(3);
        assert_that!(config.ledger.benefit_validity_months).is_equal_to(12);
        assert_that!(config.log.filter.as_str()).is_equal_to("info");
        assert_that!(config.log.json).is_false();
    }

    #[test]
    fn test_config_from_file() {
        let path = std::env::temp_dir().join(format!("loyalty-{}.yaml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "ledger:\n  max_commit_attempts: 5\nlog:\n  json: true").unwrap();

        let res = Config::load(path.to_str());
        std::fs::remove_file(&path).unwrap();

        assert_that!(res).is_ok().matches(|config| {
            config.ledger.max_commit_attempts == 5
                && config.ledger.benefit_validity_months == 12
                && config.log.json
                && config.log.filter == "info"
        });
    }

    #[test]
    fn test_config_missing_file() {
        let res = Config::load(Some("/nonexistent/loyalty-config"));
        assert_that!(res).is_err();
    }
}
