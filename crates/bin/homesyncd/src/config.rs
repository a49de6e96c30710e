//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `homesync.toml` in the working directory, or at the path named
//! by `HOMESYNC_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use homesync_adapter_virtual::DEFAULT_TEMPERATURE;
use homesync_app::services::sync_service::SyncConfig;

const DEFAULT_PATH: &str = "homesync.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sync service tuning.
    pub sync: SyncSection,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Simulated home settings.
    #[serde(rename = "virtual")]
    pub virtual_home: VirtualConfig,
}

/// Sync service tuning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Deadline for inventory calls, subscriptions and one-shot reads.
    pub read_timeout_secs: u64,
    /// Deadline for write acknowledgements.
    pub write_timeout_secs: u64,
    /// Run the window rule on temperature changes.
    pub automation_enabled: bool,
    /// Capacity of the gateway and change-event channels.
    pub event_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Simulated temperature feed for the virtual home.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// Temperature reported before the schedule starts, in °C.
    pub initial_temperature: f64,
    /// Seconds between two schedule steps.
    pub temperature_interval_secs: u64,
    /// Temperatures replayed in a loop. Empty disables the schedule.
    pub temperature_schedule: Vec<f64>,
}

impl Config {
    /// Load configuration from `homesync.toml` (or `HOMESYNC_CONFIG`) if
    /// present, then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HOMESYNC_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HOMESYNC_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("HOMESYNC_WRITE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.sync.write_timeout_secs = secs;
            }
        }
        if let Some(val) = var("HOMESYNC_AUTOMATION") {
            if let Some(enabled) = parse_flag(&val) {
                self.sync.automation_enabled = enabled;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.read_timeout_secs == 0 || self.sync.write_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be non-zero".to_string(),
            ));
        }
        if self.sync.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "event capacity must be non-zero".to_string(),
            ));
        }
        if self.virtual_home.temperature_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "temperature interval must be non-zero".to_string(),
            ));
        }
        let initial = std::iter::once(&self.virtual_home.initial_temperature);
        if initial
            .chain(&self.virtual_home.temperature_schedule)
            .any(|t| !t.is_finite())
        {
            return Err(ConfigError::Validation(
                "temperatures must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings handed to the sync service.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            read_timeout: Duration::from_secs(self.sync.read_timeout_secs),
            write_timeout: Duration::from_secs(self.sync.write_timeout_secs),
            automation_enabled: self.sync.automation_enabled,
            ..SyncConfig::default()
        }
    }

    #[must_use]
    pub fn temperature_interval(&self) -> Duration {
        Duration::from_secs(self.virtual_home.temperature_interval_secs)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            read_timeout_secs: 10,
            write_timeout_secs: 8,
            automation_enabled: true,
            event_capacity: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homesyncd=info,homesync_app=info,homesync_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            initial_temperature: DEFAULT_TEMPERATURE,
            temperature_interval_secs: 30,
            temperature_schedule: vec![21.5, 19.0, 17.5, 22.0],
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
