//! Configuration loading - TOML file with environment variable overrides.
//!
//! Reads `circadia.toml` from the working directory, or the file named by
//! `CIRCADIA_CONFIG`. Every section has defaults, but at least one schedule
//! and a bridge are required. Environment variables take precedence over
//! file values.

use std::collections::HashMap;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use circadia_adapter_hue::HueConfig;
use circadia_app::settings::SyncSettings;
use circadia_domain::schedule::{DayPattern, GeoLocation, Schedule, ScheduleCatalog, ScheduleEngine};

const DEFAULT_PATH: &str = "circadia.toml";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA zone in which clock times and day boundaries are read.
    pub timezone: String,
    /// Position used for sunrise and sunset.
    pub location: Option<GeoLocation>,
    pub bridge: HueConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub sync: SyncConfig,
    pub schedules: Vec<Schedule>,
    pub day_patterns: HashMap<String, DayPattern>,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Timings of the reconciliation loop.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub tick_interval_secs: u64,
    pub settle_window_secs: u32,
    pub max_override_minutes: u32,
    pub throttle_interval_ms: u64,
    pub drain_timeout_secs: u64,
}

impl Config {
    /// Load configuration from the config file (if present), apply
    /// environment-variable overrides and validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if the
    /// result is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CIRCADIA_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
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

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CIRCADIA_BRIDGE_ADDRESS") {
            self.bridge.address = val;
        }
        if let Ok(val) = std::env::var("CIRCADIA_APPLICATION_KEY") {
            self.bridge.application_key = val;
        }
        if let Ok(val) = std::env::var("CIRCADIA_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("CIRCADIA_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schedules.is_empty() {
            return Err(ConfigError::Validation(
                "at least one schedule is required".to_string(),
            ));
        }
        if self.bridge.address.is_empty() {
            return Err(ConfigError::Validation(
                "bridge address must be set".to_string(),
            ));
        }
        if self.bridge.application_key.is_empty() {
            return Err(ConfigError::Validation(
                "bridge application key must be set".to_string(),
            ));
        }
        if self.sync.tick_interval_secs == 0 || self.sync.throttle_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "tick and throttle intervals must be non-zero".to_string(),
            ));
        }
        let catalog = self.catalog()?;
        if let Some(location) = self.location {
            location
                .validate()
                .map_err(|err| ConfigError::Validation(err.to_string()))?;
        } else if catalog.needs_location() {
            return Err(ConfigError::Validation(
                "a location is required by sunrise and sunset steps".to_string(),
            ));
        }
        self.timezone()?;
        Ok(())
    }

    /// Parse the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for unknown zone names.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Validation(format!("unknown timezone {}", self.timezone)))
    }

    /// Schedules and day patterns, cross-checked.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem.
    pub fn catalog(&self) -> Result<ScheduleCatalog, ConfigError> {
        ScheduleCatalog::new(self.schedules.clone(), self.day_patterns.clone())
            .map_err(|err| ConfigError::Validation(err.to_string()))
    }

    /// # Errors
    ///
    /// See [`Config::timezone`].
    pub fn schedule_engine(&self) -> Result<ScheduleEngine, ConfigError> {
        Ok(ScheduleEngine::new(self.timezone()?, self.location))
    }

    #[must_use]
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            tick_interval: Duration::from_secs(self.sync.tick_interval_secs),
            settle_window: chrono::Duration::seconds(i64::from(self.sync.settle_window_secs)),
            max_override_age: chrono::Duration::minutes(i64::from(self.sync.max_override_minutes)),
            throttle_spacing: Duration::from_millis(self.sync.throttle_interval_ms),
            drain_timeout: Duration::from_secs(self.sync.drain_timeout_secs),
        }
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            location: None,
            bridge: HueConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            sync: SyncConfig::default(),
            schedules: Vec::new(),
            day_patterns: HashMap::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:circadia.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "circadiad=info,circadia=info".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            settle_window_secs: 2,
            max_override_minutes: 120,
            throttle_interval_ms: 100,
            drain_timeout_secs: 5,
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
