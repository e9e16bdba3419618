//! Configuration management for Ratewarden.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::ratelimit::{Quota, DEFAULT_LIMIT, DEFAULT_WINDOW_MS};

/// Prefix for environment variable overrides, e.g. `RATEWARDEN_LIMITER__DEFAULT_LIMIT`.
const ENV_PREFIX: &str = "RATEWARDEN";

/// Main configuration for Ratewarden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Limiter defaults and rules location
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Requests admitted per window for keys without an override
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Window length in milliseconds for keys without an override
    #[serde(default = "default_window_ms")]
    pub default_window_ms: u64,

    /// Path to a per-key override rules file
    #[serde(default)]
    pub rules_path: Option<String>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_window_ms: default_window_ms(),
            rules_path: None,
        }
    }
}

impl LimiterConfig {
    /// Build a limiter configuration with the given defaults.
    pub fn new(default_limit: u64, default_window: Duration) -> Self {
        Self {
            default_limit,
            default_window_ms: u64::try_from(default_window.as_millis()).unwrap_or(u64::MAX),
            rules_path: None,
        }
    }

    /// The fallback quota described by this configuration.
    pub fn default_quota(&self) -> Result<Quota> {
        Quota::from_millis(self.default_limit, self.default_window_ms)
    }
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl WardenConfig {
    /// Load configuration from an optional YAML file, with `RATEWARDEN_*`
    /// environment variables layered on top.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path, "Reading configuration file");
            builder = builder.add_source(
                config::File::with_name(path).format(config::FileFormat::Yaml),
            );
        }

        let config: WardenConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WardenConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject defaults that would produce an unusable quota.
    pub fn validate(&self) -> Result<()> {
        self.limiter.default_quota().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WardenError;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config() {
        let config = WardenConfig::default();
        assert_eq!(config.limiter.default_limit, 100);
        assert_eq!(config.limiter.default_window_ms, 60_000);
        assert!(config.limiter.rules_path.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_parse_partial_config() {
        let yaml = r#"
limiter:
  default_limit: 3
"#;
        let config = assert_ok!(WardenConfig::from_yaml(yaml));
        assert_eq!(config.limiter.default_limit, 3);
        assert_eq!(config.limiter.default_window_ms, 60_000);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
limiter:
  default_limit: 5
  default_window_ms: 1000
  rules_path: /etc/ratewarden/rules.yaml
logging:
  level: debug
  json: true
"#;
        let config = assert_ok!(WardenConfig::from_yaml(yaml));
        let quota = config.limiter.default_quota().unwrap();
        assert_eq!(quota.limit(), 5);
        assert_eq!(quota.window(), Duration::from_secs(1));
        assert_eq!(
            config.limiter.rules_path.as_deref(),
            Some("/etc/ratewarden/rules.yaml")
        );
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_zero_default_limit_rejected() {
        let yaml = r#"
limiter:
  default_limit: 0
"#;
        assert_err!(WardenConfig::from_yaml(yaml));
    }

    #[test]
    fn test_malformed_yaml_reports_yaml_error() {
        let result = WardenConfig::from_yaml("limiter: [unclosed");
        assert!(matches!(result, Err(WardenError::Yaml(_))));
    }

    #[test]
    fn test_new_saturates_oversized_window() {
        let config = LimiterConfig::new(1, Duration::MAX);
        assert_eq!(config.default_window_ms, u64::MAX);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = assert_ok!(WardenConfig::load(None));
        assert!(config.limiter.default_limit > 0);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "ratewarden-config-{}.yaml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "limiter:\n  default_limit: 7\n  default_window_ms: 2500\n",
        )
        .unwrap();

        let config = WardenConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.limiter.default_limit, 7);
        assert_eq!(config.limiter.default_window_ms, 2_500);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert_err!(WardenConfig::load(Some("/nonexistent/ratewarden.yaml")));
    }
}
