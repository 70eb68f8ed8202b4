use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::parser::LogParser;

/// Main configuration structure for Causeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub patterns: PatternConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file is missing.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Failed to load config from {:?}: {}. Using defaults.",
                    path.as_ref(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Get the default configuration as a TOML string.
    pub fn default_toml() -> Result<String> {
        let config = Self::default();
        toml::to_string_pretty(&config).context("Failed to serialize default config")
    }

    /// Validate the configuration for obvious misconfiguration.
    pub fn validate(&self) -> Result<()> {
        if self.patterns.event.trim().is_empty() {
            anyhow::bail!("Event pattern cannot be empty");
        }

        // Compiling the parser checks both patterns and the required
        // capture groups in one place.
        self.build_parser()
            .map_err(|e| anyhow::anyhow!("Invalid patterns: {}", e))?;

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("Invalid log level: {}", other),
        }

        Ok(())
    }

    /// Build a parser from the configured patterns.
    pub fn build_parser(&self) -> std::result::Result<LogParser, crate::error::ParseError> {
        LogParser::new(&self.patterns.event, self.patterns.delimiter.as_deref())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("Failed to parse config")?;
        Ok(config)
    }
}

/// Patterns applied to the raw log text.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternConfig {
    /// Event pattern; must define named groups `clock`, `event` and `host`.
    #[serde(default = "default_event_pattern")]
    pub event: String,

    /// Optional delimiter pattern separating executions; may define a
    /// named group `trace` that labels the following execution.
    #[serde(default)]
    pub delimiter: Option<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            event: default_event_pattern(),
            delimiter: None,
        }
    }
}

fn default_event_pattern() -> String {
    r"(?P<host>\S+) (?P<clock>\{[^}]*\}) (?P<event>.*)".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
