use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use stratus_weather::policy::gate::{
    DEFAULT_GLOBAL_LIMIT, DEFAULT_GLOBAL_WINDOW_SECS, DEFAULT_LOCATION_MIN_INTERVAL_SECS,
};
use stratus_weather::policy::DEFAULT_BACKOFF_STEPS_SECS;
use stratus_weather::{
    BackoffSchedule, FreshnessThresholds, RequestGateConfig, RequestPolicy, WeatherError,
};

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (cache lives here too)
    pub config_dir: PathBuf,

    /// Weather refresh settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Delay after the 1st, 2nd, ... consecutive failure; the last step repeats
    #[serde(default = "default_backoff_steps_secs")]
    pub backoff_steps_secs: Vec<u64>,

    #[serde(default)]
    pub freshness: FreshnessConfig,

    #[serde(default)]
    pub requests: RequestLimitsConfig,
}

fn default_backoff_steps_secs() -> Vec<u64> {
    DEFAULT_BACKOFF_STEPS_SECS.to_vec()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            backoff_steps_secs: default_backoff_steps_secs(),
            freshness: FreshnessConfig::default(),
            requests: RequestLimitsConfig::default(),
        }
    }
}

/// Maximum age per dataset before it is refetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    pub current_minutes: u32,
    pub hourly_minutes: u32,
    pub daily_minutes: u32,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            current_minutes: 10,
            hourly_minutes: 60,
            daily_minutes: 360,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLimitsConfig {
    /// Minimum seconds between two requests for the same location
    pub location_min_interval_secs: u64,
    /// Width of the global sliding window in seconds
    pub global_window_secs: u64,
    /// Requests allowed inside the window, across all locations
    pub global_limit: u32,
}

impl Default for RequestLimitsConfig {
    fn default() -> Self {
        Self {
            location_min_interval_secs: DEFAULT_LOCATION_MIN_INTERVAL_SECS,
            global_window_secs: DEFAULT_GLOBAL_WINDOW_SECS,
            global_limit: DEFAULT_GLOBAL_LIMIT,
        }
    }
}

fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}

impl WeatherConfig {
    /// Build the request policy these settings describe.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError::InvalidPolicy`] for zero limits or an empty
    /// backoff table.
    pub fn to_policy(&self) -> Result<RequestPolicy, WeatherError> {
        Ok(RequestPolicy {
            thresholds: FreshnessThresholds {
                current: minutes(self.freshness.current_minutes),
                hourly: minutes(self.freshness.hourly_minutes),
                daily: minutes(self.freshness.daily_minutes),
            },
            gate: RequestGateConfig::new(
                Duration::from_secs(self.requests.location_min_interval_secs),
                Duration::from_secs(self.requests.global_window_secs),
                self.requests.global_limit,
            )?,
            backoff: BackoffSchedule::from_secs(&self.backoff_steps_secs)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stratus");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            tracing::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load()?)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load_from(path)?)
    }

    fn validated(config: Self) -> Result<(Self, ValidationResult)> {
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()))
                .context("Configuration validation failed");
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        // Request limits must all be positive
        if weather.requests.location_min_interval_secs == 0 {
            result.add_error(
                "weather.requests.location_min_interval_secs",
                "Per-location interval must be greater than 0",
            );
        }
        if weather.requests.global_window_secs == 0 {
            result.add_error(
                "weather.requests.global_window_secs",
                "Global window must be greater than 0",
            );
        }
        if weather.requests.global_limit == 0 {
            result.add_error(
                "weather.requests.global_limit",
                "Global request limit must be greater than 0",
            );
        }

        // Backoff table
        if weather.backoff_steps_secs.is_empty() {
            result.add_error(
                "weather.backoff_steps_secs",
                "At least one backoff step is required",
            );
        } else if weather.backoff_steps_secs.windows(2).any(|w| w[1] < w[0]) {
            result.add_warning(
                "weather.backoff_steps_secs",
                "Backoff steps are not in ascending order",
            );
        }

        // Freshness thresholds
        if weather.freshness.current_minutes == 0 {
            result.add_warning(
                "weather.freshness.current_minutes",
                "Current conditions will be refetched on every refresh (0 minutes)",
            );
        }
        if weather.freshness.daily_minutes > 1440 {
            result.add_warning(
                "weather.freshness.daily_minutes",
                "Daily forecast threshold is more than 24 hours",
            );
        }

        result
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("stratus");

        Ok(config_dir.join("config.toml"))
    }
}
