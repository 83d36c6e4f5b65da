//! Persistent cache of the last successful response per location and dataset.
//!
//! The cache is what the freshness resolver is fed from: a dataset counts
//! as present only if an entry exists with a positive update time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::policy::{DatasetRefreshInput, FreshnessThresholds};
use crate::types::{LocationKey, WeatherDataset, WeatherError};

const CACHE_FILE_NAME: &str = "weather_cache.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDataset {
    pub updated_at_ms: i64,
    pub payload: serde_json::Value,
}

type LocationEntries = BTreeMap<WeatherDataset, CachedDataset>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    locations: BTreeMap<LocationKey, LocationEntries>,
}

#[derive(Debug)]
pub struct WeatherCache {
    cache_path: PathBuf,
    data: CacheFile,
}

impl WeatherCache {
    /// Empty cache that will be written to `config_dir` on save.
    pub fn new(config_dir: &Path) -> Self {
        Self {
            cache_path: config_dir.join(CACHE_FILE_NAME),
            data: CacheFile::default(),
        }
    }

    /// Load the cache from `config_dir`. A missing file yields an empty cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(config_dir: &Path) -> Result<Self, WeatherError> {
        let mut cache = Self::new(config_dir);
        if !cache.cache_path.exists() {
            tracing::debug!("No weather cache at {}", cache.cache_path.display());
            return Ok(cache);
        }

        let contents = std::fs::read_to_string(&cache.cache_path)?;
        cache.data = serde_json::from_str(&contents)?;
        tracing::info!(
            "Loaded weather cache with {} locations",
            cache.data.locations.len()
        );
        Ok(cache)
    }

    /// Write the cache atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self) -> Result<(), WeatherError> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.data)?;
        let tmp_path = self.cache_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.cache_path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    pub fn store(
        &mut self,
        key: &LocationKey,
        dataset: WeatherDataset,
        payload: serde_json::Value,
        now_ms: i64,
    ) {
        self.data.locations.entry(key.clone()).or_default().insert(
            dataset,
            CachedDataset {
                updated_at_ms: now_ms,
                payload,
            },
        );
    }

    pub fn get(&self, key: &LocationKey, dataset: WeatherDataset) -> Option<&CachedDataset> {
        self.data.locations.get(key)?.get(&dataset)
    }

    /// Remove every dataset cached for `key`. Returns whether anything was removed.
    pub fn remove(&mut self, key: &LocationKey) -> bool {
        self.data.locations.remove(key).is_some()
    }

    pub fn locations(&self) -> impl Iterator<Item = &LocationKey> {
        self.data.locations.keys()
    }

    fn updated_at(&self, key: &LocationKey, dataset: WeatherDataset) -> Option<i64> {
        self.get(key, dataset)
            .map(|entry| entry.updated_at_ms)
            .filter(|&at| at > 0)
    }

    /// Build the freshness input for `key` at `now_ms`.
    ///
    /// A dataset without an entry, or whose update time is not positive
    /// ("never updated"), is reported as absent.
    pub fn refresh_input(
        &self,
        key: &LocationKey,
        force: bool,
        now_ms: i64,
        thresholds: FreshnessThresholds,
    ) -> DatasetRefreshInput {
        let current = self.updated_at(key, WeatherDataset::Current);
        let hourly = self.updated_at(key, WeatherDataset::Hourly);
        let daily = self.updated_at(key, WeatherDataset::Daily);

        DatasetRefreshInput {
            force,
            has_current: current.is_some(),
            has_hourly: hourly.is_some(),
            has_daily: daily.is_some(),
            current_updated_at_ms: current.unwrap_or(0),
            hourly_updated_at_ms: hourly.unwrap_or(0),
            daily_updated_at_ms: daily.unwrap_or(0),
            now_ms,
            thresholds,
        }
    }
}
