use serde::{Deserialize, Serialize};

/// One of the independently fetched weather data groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherDataset {
    Current,
    Hourly,
    Daily,
}

impl WeatherDataset {
    /// All datasets, in fetch order.
    pub const ALL: [WeatherDataset; 3] = [Self::Current, Self::Hourly, Self::Daily];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }
}

impl std::fmt::Display for WeatherDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic location the user follows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Stable key used to index per-location state and cache entries.
    ///
    /// Coordinates are rounded to four decimals (~11 m), so two searches
    /// resolving to the same place share rate-limit and cache state.
    pub fn key(&self) -> LocationKey {
        LocationKey(format!("{:.4},{:.4}", self.latitude, self.longitude))
    }

    /// Name for display, falling back to coordinates
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{:.2}, {:.2}", self.latitude, self.longitude))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Location> for LocationKey {
    fn from(location: &Location) -> Self {
        location.key()
    }
}

impl std::fmt::Display for LocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Weather policy and cache errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Invalid request policy: {0}")]
    InvalidPolicy(String),
    #[error("Cache error: {0}")]
    Cache(#[from] std::io::Error),
    #[error("Cache format error: {0}")]
    CacheFormat(#[from] serde_json::Error),
    #[error("Fetch failed: {0}")]
    Fetch(String),
}

impl WeatherError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidPolicy(_) => "Weather refresh settings are invalid. Check settings.",
            Self::Cache(_) | Self::CacheFormat(_) => "Weather data may be outdated.",
            Self::Fetch(_) => "Weather service error. Please try again.",
        }
    }

    /// Whether the failure should count towards the location's backoff.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_ordering_matches_fetch_order() {
        let mut datasets = vec![
            WeatherDataset::Daily,
            WeatherDataset::Current,
            WeatherDataset::Hourly,
        ];
        datasets.sort();
        assert_eq!(datasets, WeatherDataset::ALL.to_vec());
    }

    #[test]
    fn test_dataset_serde_lowercase() {
        let json = serde_json::to_string(&WeatherDataset::Hourly).unwrap();
        assert_eq!(json, "\"hourly\"");
        assert_eq!(WeatherDataset::Daily.to_string(), "daily");
    }

    #[test]
    fn test_location_key_rounds_coordinates() {
        let a = Location::new(47.606_21, -122.332_11);
        let b = Location::new(47.606_24, -122.332_14).with_name("Seattle");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().as_str(), "47.6062,-122.3321");
    }

    #[test]
    fn test_location_display_name_fallback() {
        let loc = Location::new(51.5074, -0.1278);
        assert_eq!(loc.display_name(), "51.51, -0.13");
        assert_eq!(loc.with_name("London").display_name(), "London");
    }

    #[test]
    fn test_error_user_messages() {
        assert!(WeatherError::Fetch("timeout".into()).user_message().contains("Weather"));
        assert!(WeatherError::InvalidPolicy("x".into()).user_message().contains("settings"));
    }

    #[test]
    fn test_only_fetch_errors_count_as_failures() {
        assert!(WeatherError::Fetch("500".into()).is_fetch_failure());
        assert!(!WeatherError::InvalidPolicy("x".into()).is_fetch_failure());
    }
}
