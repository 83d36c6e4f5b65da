//! Errors surfaced at the application edge.
//!
//! Library code keeps its own error types; [`App`](crate::App) folds them
//! into [`AppError`] so the binary can print a short `user_message()` and
//! log the full chain.

use thiserror::Error;

pub use stratus_weather::WeatherError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    #[error("{0:#}")]
    Other(anyhow::Error),
}

/// Config loading reports through `anyhow` for its context chain; keep the
/// typed [`ConfigError`] when one is at the root of it.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ConfigError>() {
            Ok(config) => AppError::Config(config),
            Err(other) => AppError::Other(other),
        }
    }
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Other(_) => "Stratus could not start. See the log for details.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Refresh settings are invalid. Check config.toml.",
            ConfigError::ParseError(_) => "config.toml is malformed. Fix or delete it.",
        }
    }
}
