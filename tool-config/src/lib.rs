//! Engine configuration.
//!
//! Settings are read from JSON, then optionally overridden from `TOOLHOST_*`
//! environment variables, then validated.
//!
//! ```
//! use tool_config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{"executor": {"max_concurrency": 8}}"#).unwrap();
//! assert_eq!(config.executor.max_concurrency, 8);
//! assert_eq!(config.executor.history_limit, 1000);
//! ```

#![warn(missing_docs, clippy::pedantic)]

mod error;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tool_kernel::{ExecutorConfig, SensitiveDataMode};
use tool_telemetry::TelemetryConfig;
use tracing::debug;

pub use error::{ConfigError, ConfigResult};

/// Overrides `executor.max_concurrency`.
pub const ENV_MAX_CONCURRENCY: &str = "TOOLHOST_MAX_CONCURRENCY";
/// Overrides `executor.default_timeout_secs`.
pub const ENV_DEFAULT_TIMEOUT_SECS: &str = "TOOLHOST_DEFAULT_TIMEOUT_SECS";
/// Overrides `executor.sensitive_data` (`off`, `detect`, `redact`).
pub const ENV_SENSITIVE_DATA: &str = "TOOLHOST_SENSITIVE_DATA";
/// Overrides `telemetry.filter`.
pub const ENV_LOG: &str = "TOOLHOST_LOG";

/// Executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// Parallel batch limit.
    pub max_concurrency: usize,
    /// Timeout applied when the caller sets none.
    pub default_timeout_secs: Option<u64>,
    /// Handling of sensitive data in results.
    pub sensitive_data: SensitiveDataMode,
    /// Execution records retained in memory.
    pub history_limit: usize,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            default_timeout_secs: None,
            sensitive_data: SensitiveDataMode::Detect,
            history_limit: 1000,
        }
    }
}

/// Security settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// NDJSON file receiving audit entries. In memory when absent.
    pub audit_journal: Option<PathBuf>,
    /// Apply the default policy to tools without an explicit one.
    pub default_policy_for_unknown_tools: bool,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            audit_journal: None,
            default_policy_for_unknown_tools: true,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executor settings.
    pub executor: ExecutorSection,
    /// Logging settings.
    pub telemetry: TelemetryConfig,
    /// Security settings.
    pub security: SecuritySection,
}

impl EngineConfig {
    /// Parses and validates a JSON document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json_str(source: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates the JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded engine configuration");
        Self::from_json_str(&source)
    }

    /// Applies `TOOLHOST_*` environment overrides and re-validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for unparsable values and
    /// [`ConfigError::Invalid`] when the result is out of range.
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_CONCURRENCY) {
            self.executor.max_concurrency = parse_env(ENV_MAX_CONCURRENCY, &value)?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_TIMEOUT_SECS) {
            self.executor.default_timeout_secs = Some(parse_env(ENV_DEFAULT_TIMEOUT_SECS, &value)?);
        }
        if let Some(value) = lookup(ENV_SENSITIVE_DATA) {
            self.executor.sensitive_data = match value.trim().to_ascii_lowercase().as_str() {
                "off" => SensitiveDataMode::Off,
                "detect" => SensitiveDataMode::Detect,
                "redact" => SensitiveDataMode::Redact,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: ENV_SENSITIVE_DATA,
                        value,
                    });
                }
            };
        }
        if let Some(value) = lookup(ENV_LOG).filter(|value| !value.trim().is_empty()) {
            self.telemetry.filter = Some(value);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero concurrency, a zero timeout,
    /// or a zero history limit.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.executor.max_concurrency == 0 {
            return Err(ConfigError::invalid(
                "executor.max_concurrency",
                "must be greater than zero",
            ));
        }
        if self.executor.default_timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "executor.default_timeout_secs",
                "must be greater than zero when set",
            ));
        }
        if self.executor.history_limit == 0 {
            return Err(ConfigError::invalid(
                "executor.history_limit",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Builds the executor configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when validation fails.
    pub fn executor_config(&self) -> ConfigResult<ExecutorConfig> {
        self.validate()?;
        let (Some(max_concurrency), Some(history_limit)) = (
            NonZeroUsize::new(self.executor.max_concurrency),
            NonZeroUsize::new(self.executor.history_limit),
        ) else {
            return Err(ConfigError::invalid("executor", "limits must be non-zero"));
        };

        let mut config = ExecutorConfig::new(max_concurrency)
            .with_history_limit(history_limit)
            .with_sensitive_data(self.executor.sensitive_data);
        if let Some(secs) = self.executor.default_timeout_secs {
            config = config.with_default_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Returns the logging settings.
    #[must_use]
    pub fn telemetry_config(&self) -> &TelemetryConfig {
        &self.telemetry
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv {
            key,
            value: value.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.security.default_policy_for_unknown_tools);

        let executor = config.executor_config().unwrap();
        assert_eq!(executor.max_concurrency().get(), 5);
        assert_eq!(executor.default_timeout(), None);
        assert_eq!(executor.sensitive_data(), SensitiveDataMode::Detect);
    }

    #[test]
    fn json_sections_are_read() {
        let config = EngineConfig::from_json_str(
            r#"{
                "executor": {"default_timeout_secs": 30, "sensitive_data": "redact"},
                "telemetry": {"filter": "tool_kernel=debug", "ansi": false},
                "security": {"audit_journal": "audit.ndjson"}
            }"#,
        )
        .unwrap();
        let executor = config.executor_config().unwrap();
        assert_eq!(executor.default_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(executor.sensitive_data(), SensitiveDataMode::Redact);
        assert_eq!(config.telemetry.filter.as_deref(), Some("tool_kernel=debug"));
        assert!(!config.telemetry.ansi);
        assert_eq!(
            config.security.audit_journal,
            Some(PathBuf::from("audit.ndjson"))
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{"executor": {"max_concurrency": 0}}"#)
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field, .. } if field == "executor.max_concurrency")
        );

        let err = EngineConfig::from_json_str(r#"{"executor": {"default_timeout_secs": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = EngineConfig::from_json_str(r#"{"executor": {"sensitive_data": "shout"}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn environment_overrides_apply() {
        let config = EngineConfig::default()
            .with_overrides(overrides(&[
                (ENV_MAX_CONCURRENCY, "12"),
                (ENV_DEFAULT_TIMEOUT_SECS, " 45 "),
                (ENV_SENSITIVE_DATA, "OFF"),
                (ENV_LOG, "debug"),
            ]))
            .unwrap();
        assert_eq!(config.executor.max_concurrency, 12);
        assert_eq!(config.executor.default_timeout_secs, Some(45));
        assert_eq!(config.executor.sensitive_data, SensitiveDataMode::Off);
        assert_eq!(config.telemetry.filter.as_deref(), Some("debug"));

        let err = EngineConfig::default()
            .with_overrides(overrides(&[(ENV_MAX_CONCURRENCY, "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { key: ENV_MAX_CONCURRENCY, .. }
        ));

        let err = EngineConfig::default()
            .with_overrides(overrides(&[(ENV_MAX_CONCURRENCY, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn load_reads_files() {
        let mut path = std::env::temp_dir();
        path.push(format!("toolhost-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"executor": {"history_limit": 10}}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.executor.history_limit, 10);
        let _ = std::fs::remove_file(&path);

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
