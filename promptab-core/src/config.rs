use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PromptabError, PromptabResult};
use crate::models::PrimaryMetric;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptabConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_max_session_age")]
    pub max_session_age_secs: u64,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Upper bound on live sessions; `None` means unbounded.
    #[serde(default)]
    pub max_sessions: Option<usize>,

    #[serde(default = "default_source")]
    pub default_source: String,

    #[serde(default = "default_user_agent")]
    pub default_user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_metric")]
    pub default_metric: String,

    #[serde(default)]
    pub strict_metrics: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

fn default_max_session_age() -> u64 {
    3600
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_source() -> String {
    "api".to_string()
}

fn default_user_agent() -> String {
    "unknown".to_string()
}

fn default_metric() -> String {
    "cost".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_session_age_secs: default_max_session_age(),
            cleanup_interval_secs: default_cleanup_interval(),
            max_sessions: None,
            default_source: default_source(),
            default_user_agent: default_user_agent(),
        }
    }
}

impl LedgerConfig {
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    pub fn with_max_session_age(mut self, secs: u64) -> Self {
        self.max_session_age_secs = secs;
        self
    }

    pub fn with_cleanup_interval(mut self, secs: u64) -> Self {
        self.cleanup_interval_secs = secs;
        self
    }

    pub fn max_session_age(&self) -> Duration {
        Duration::from_secs(self.max_session_age_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            default_metric: default_metric(),
            strict_metrics: false,
        }
    }
}

impl AggregatorConfig {
    pub fn strict(mut self) -> Self {
        self.strict_metrics = true;
        self
    }

    pub fn with_default_metric(mut self, metric: impl Into<String>) -> Self {
        self.default_metric = metric.into();
        self
    }

    pub fn default_metric(&self) -> PrimaryMetric {
        PrimaryMetric::parse(&self.default_metric)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl PromptabConfig {
    pub fn load() -> PromptabResult<Self> {
        Self::load_from_paths(get_config_paths())
    }

    pub fn load_from_paths(paths: Vec<PathBuf>) -> PromptabResult<Self> {
        load_dotenv_files();

        let mut builder = ConfigBuilder::builder();

        for path in paths {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("PROMPTAB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut promptab_config: PromptabConfig = config.try_deserialize()?;

        if let Ok(level) = std::env::var("PROMPTAB_LOG_LEVEL") {
            promptab_config.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            promptab_config.logging.level = level;
        }

        promptab_config.validate()?;

        Ok(promptab_config)
    }

    pub fn validate(&self) -> PromptabResult<()> {
        if self.ledger.cleanup_interval_secs == 0 {
            return Err(PromptabError::InvalidConfigValue {
                key: "ledger.cleanup_interval_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.ledger.max_sessions == Some(0) {
            return Err(PromptabError::InvalidConfigValue {
                key: "ledger.max_sessions".to_string(),
                message: "Must be greater than 0 when set".to_string(),
            });
        }

        if self.aggregator.strict_metrics && self.aggregator.default_metric().is_fallback() {
            return Err(PromptabError::InvalidConfigValue {
                key: "aggregator.default_metric".to_string(),
                message: format!(
                    "Unknown metric '{}'. Must be one of: cost, latency, tokens",
                    self.aggregator.default_metric
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !valid_levels.contains(&level_lower.as_str()) && !level_lower.contains('=') {
            return Err(PromptabError::InvalidConfigValue {
                key: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        Ok(())
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config").join("default.toml"));
        paths.push(cwd.join("config").join("local.toml"));
        paths.push(cwd.join("promptab.toml"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join("config.toml"));
    }

    paths
}

fn load_dotenv_files() {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".env"));
        paths.push(cwd.join(".env.local"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join(".env"));
    }

    for path in paths {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("promptab"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PromptabConfig::default();

        assert_eq!(config.ledger.max_session_age_secs, 3600);
        assert_eq!(config.ledger.cleanup_interval_secs, 300);
        assert_eq!(config.ledger.max_sessions, None);
        assert_eq!(config.ledger.default_source, "api");
        assert_eq!(config.ledger.default_user_agent, "unknown");
        assert_eq!(config.aggregator.default_metric, "cost");
        assert!(!config.aggregator.strict_metrics);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(PromptabConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_zero_cleanup_interval() {
        let mut config = PromptabConfig::default();
        config.ledger.cleanup_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_max_sessions() {
        let mut config = PromptabConfig::default();
        config.ledger.max_sessions = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_unknown_metric_only_fails_when_strict() {
        let mut config = PromptabConfig::default();
        config.aggregator.default_metric = "quality".to_string();
        assert!(config.validate().is_ok());

        config.aggregator.strict_metrics = true;
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validation_log_levels() {
        let mut config = PromptabConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "promptab_core=debug,warn".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_helpers() {
        let ledger = LedgerConfig::default()
            .with_max_session_age(90)
            .with_cleanup_interval(15);
        assert_eq!(ledger.max_session_age(), Duration::from_secs(90));
        assert_eq!(ledger.cleanup_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promptab.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[ledger]\nmax_session_age_secs = 60\nmax_sessions = 500\n\n[aggregator]\ndefault_metric = \"latency\""
        )
        .unwrap();

        let config = PromptabConfig::load_from_paths(vec![path]).unwrap();

        assert_eq!(config.ledger.max_session_age_secs, 60);
        assert_eq!(config.ledger.max_sessions, Some(500));
        assert_eq!(config.ledger.cleanup_interval_secs, 300);
        assert_eq!(config.aggregator.default_metric(), PrimaryMetric::Latency);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promptab.toml");
        std::fs::write(&path, "[ledger\nmax_session_age_secs = ").unwrap();

        assert!(PromptabConfig::load_from_paths(vec![path]).is_err());
    }
}
