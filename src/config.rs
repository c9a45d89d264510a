//! Toolkit configuration (tether.toml)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment switch for native call tracing
pub const TRACE_NATIVE_ENV: &str = "TETHER_TRACE_NATIVE";

/// Configuration loaded from tether.toml
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolkitConfig {
    /// Display / event loop tuning
    #[serde(default)]
    pub display: DisplayConfig,

    /// Logging setup
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Display and event loop settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Upper bound for one native wait in `Display::sleep`, in milliseconds
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Work items executed per `read_and_dispatch` pass
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Application name reported in logs
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait_ms(),
            batch_limit: default_batch_limit(),
            app_name: default_app_name(),
        }
    }
}

impl DisplayConfig {
    /// Bounded wait used by the event loop
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms.max(1))
    }

    /// Work items per dispatch pass; never zero so queued work always drains
    pub fn batch(&self) -> usize {
        self.batch_limit.max(1)
    }
}

fn default_max_wait_ms() -> u64 {
    100
}

fn default_batch_limit() -> usize {
    64
}

fn default_app_name() -> String {
    "tether".to_string()
}

/// Logging settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Trace every native call (also enabled by TETHER_TRACE_NATIVE)
    #[serde(default)]
    pub trace_native: bool,

    /// Extra filter directives, e.g. "tether_ui=debug"
    #[serde(default)]
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Whether native tracing is on, after applying the environment switch
    pub fn trace_native_enabled(&self) -> bool {
        match std::env::var(TRACE_NATIVE_ENV) {
            Ok(value) => matches!(value.trim(), "1" | "true" | "yes" | "on"),
            Err(_) => self.trace_native,
        }
    }
}

impl ToolkitConfig {
    /// Find tether.toml in standard locations
    pub fn find_config_path() -> Option<PathBuf> {
        // Check in order: config dir, exe dir, cwd
        let candidates = [
            dirs::config_dir().map(|p| p.join("tether").join("tether.toml")),
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("tether.toml"))),
            Some(PathBuf::from("tether.toml")),
        ];

        candidates
            .into_iter()
            .flatten()
            .find(|candidate| candidate.exists())
    }

    /// Load configuration, returning defaults if none is found or it is unreadable
    pub fn load() -> Self {
        match Self::find_config_path() {
            Some(path) => Self::load_from_path(&path).unwrap_or_else(|e| {
                tracing::warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ToolkitConfig = toml::from_str(content)?;
        if config.display.batch_limit == 0 {
            return Err(ConfigError::Invalid(
                "display.batch_limit must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ToolkitConfig::default();
        assert_eq!(config.display.max_wait_ms, 100);
        assert_eq!(config.display.batch_limit, 64);
        assert_eq!(config.display.max_wait(), Duration::from_millis(100));
        assert!(!config.logging.trace_native);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let display = DisplayConfig {
            max_wait_ms: 0,
            batch_limit: 0,
            ..DisplayConfig::default()
        };
        assert_eq!(display.max_wait(), Duration::from_millis(1));
        assert_eq!(display.batch(), 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ToolkitConfig::parse(
            r#"
            [display]
            max_wait_ms = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.display.max_wait_ms, 20);
        assert_eq!(config.display.batch_limit, 64);
        assert_eq!(config.display.app_name, "tether");
    }

    #[test]
    fn test_zero_batch_limit_rejected() {
        let err = ToolkitConfig::parse("[display]\nbatch_limit = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[logging]\ntrace_native = true\nfilter = \"tether_ui=debug\""
        )
        .unwrap();

        let config = ToolkitConfig::load_from_path(file.path()).unwrap();
        assert!(config.logging.trace_native);
        assert_eq!(config.logging.filter.as_deref(), Some("tether_ui=debug"));
    }

    #[test]
    fn test_load_from_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolkitConfig::load_from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_bad_toml() {
        let err = ToolkitConfig::parse("[display\nmax_wait_ms = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
