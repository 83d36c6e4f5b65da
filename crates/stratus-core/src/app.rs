use std::collections::BTreeSet;
use std::sync::Arc;

use stratus_weather::{
    resolve_datasets_to_refresh, GateDecision, Location, LocationKey, RefreshCoordinator,
    WeatherCache, WeatherDataset,
};

use crate::{AppError, Config};

/// What a refresh of one location would do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPlan {
    pub location: LocationKey,
    pub datasets: BTreeSet<WeatherDataset>,
    pub decision: GateDecision,
}

impl RefreshPlan {
    /// True if at least one dataset is stale or missing.
    pub fn is_needed(&self) -> bool {
        !self.datasets.is_empty()
    }

    /// True if a request should be sent now.
    pub fn can_fetch_now(&self) -> bool {
        self.is_needed() && self.decision.is_allowed
    }
}

/// Main application state and lifecycle manager
pub struct App {
    config: Arc<Config>,
    cache: WeatherCache,
    coordinator: RefreshCoordinator,
}

impl App {
    /// Create a new application instance from the user's config file
    pub fn new() -> Result<Self, AppError> {
        let (config, _) = Config::load_validated()?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self, AppError> {
        let policy = config.weather.to_policy()?;

        let cache = match WeatherCache::open(&config.config_dir) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("Ignoring unreadable weather cache: {}", e);
                WeatherCache::new(&config.config_dir)
            }
        };

        tracing::info!("Application initialized");
        Ok(Self {
            config: Arc::new(config),
            cache,
            coordinator: RefreshCoordinator::new(policy),
        })
    }

    /// Datasets to refetch for `location` and whether a request may go out now
    pub fn plan_refresh(&self, location: &Location, force: bool) -> RefreshPlan {
        let key = location.key();
        let now_ms = self.coordinator.now_ms();
        let input = self
            .cache
            .refresh_input(&key, force, now_ms, self.coordinator.policy().thresholds);
        let datasets = resolve_datasets_to_refresh(&input);
        let decision = self.coordinator.evaluate(&key);

        tracing::debug!(
            "Refresh plan for {}: {:?}, allowed: {}",
            location.display_name(),
            datasets,
            decision.is_allowed
        );
        RefreshPlan {
            location: key,
            datasets,
            decision,
        }
    }

    /// Store a freshly fetched dataset payload for `location`
    pub fn record_fetched(
        &mut self,
        location: &Location,
        dataset: WeatherDataset,
        payload: serde_json::Value,
    ) {
        let now_ms = self.coordinator.now_ms();
        self.cache.store(&location.key(), dataset, payload, now_ms);
    }

    /// Forget everything known about a location the user removed
    pub fn remove_location(&mut self, location: &Location) {
        let key = location.key();
        self.coordinator.forget(&key);
        self.cache.remove(&key);
        tracing::info!("Removed location {}", location.display_name());
    }

    /// Shutdown the application, persisting the weather cache
    pub fn shutdown(&mut self) -> Result<(), AppError> {
        tracing::info!("Shutting down application");
        self.cache.save()?;
        tracing::debug!("Saved weather cache to {}", self.cache.path().display());
        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }
}
