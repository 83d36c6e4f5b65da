//! Dataset freshness: which of the weather datasets need refetching.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::types::WeatherDataset;

/// Maximum tolerated age per dataset before it is considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessThresholds {
    pub current: Duration,
    pub hourly: Duration,
    pub daily: Duration,
}

impl FreshnessThresholds {
    pub fn for_dataset(&self, dataset: WeatherDataset) -> Duration {
        match dataset {
            WeatherDataset::Current => self.current,
            WeatherDataset::Hourly => self.hourly,
            WeatherDataset::Daily => self.daily,
        }
    }
}

/// Snapshot of one location's dataset state at `now_ms`.
///
/// The `has_*` flags are authoritative for "no data": an `*_updated_at_ms`
/// value is only read when the matching flag is set.
#[derive(Debug, Clone, Copy)]
pub struct DatasetRefreshInput {
    pub force: bool,
    pub has_current: bool,
    pub has_hourly: bool,
    pub has_daily: bool,
    pub current_updated_at_ms: i64,
    pub hourly_updated_at_ms: i64,
    pub daily_updated_at_ms: i64,
    pub now_ms: i64,
    pub thresholds: FreshnessThresholds,
}

impl DatasetRefreshInput {
    fn is_present(&self, dataset: WeatherDataset) -> bool {
        match dataset {
            WeatherDataset::Current => self.has_current,
            WeatherDataset::Hourly => self.has_hourly,
            WeatherDataset::Daily => self.has_daily,
        }
    }

    fn updated_at_ms(&self, dataset: WeatherDataset) -> i64 {
        match dataset {
            WeatherDataset::Current => self.current_updated_at_ms,
            WeatherDataset::Hourly => self.hourly_updated_at_ms,
            WeatherDataset::Daily => self.daily_updated_at_ms,
        }
    }

    fn is_stale(&self, dataset: WeatherDataset) -> bool {
        if !self.is_present(dataset) {
            return true;
        }
        let age_ms = i128::from(self.now_ms) - i128::from(self.updated_at_ms(dataset));
        age_ms > self.thresholds.for_dataset(dataset).as_millis() as i128
    }
}

/// Resolve the datasets that must be fetched for one location.
///
/// A dataset is included when `force` is set, when it is missing, or when
/// its age is strictly greater than its threshold. An age exactly equal to
/// the threshold still counts as fresh.
pub fn resolve_datasets_to_refresh(input: &DatasetRefreshInput) -> BTreeSet<WeatherDataset> {
    if input.force {
        return WeatherDataset::ALL.into_iter().collect();
    }

    WeatherDataset::ALL
        .into_iter()
        .filter(|dataset| input.is_stale(*dataset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn thresholds() -> FreshnessThresholds {
        FreshnessThresholds {
            current: Duration::from_secs(5 * 60),
            hourly: Duration::from_secs(60 * 60),
            daily: Duration::from_secs(6 * 60 * 60),
        }
    }

    fn all_fresh() -> DatasetRefreshInput {
        DatasetRefreshInput {
            force: false,
            has_current: true,
            has_hourly: true,
            has_daily: true,
            current_updated_at_ms: NOW - 1_000,
            hourly_updated_at_ms: NOW - 1_000,
            daily_updated_at_ms: NOW - 1_000,
            now_ms: NOW,
            thresholds: thresholds(),
        }
    }

    #[test]
    fn test_all_fresh_resolves_nothing() {
        assert!(resolve_datasets_to_refresh(&all_fresh()).is_empty());
    }

    #[test]
    fn test_missing_dataset_is_refreshed_regardless_of_timestamp() {
        let input = DatasetRefreshInput {
            has_hourly: false,
            hourly_updated_at_ms: NOW,
            ..all_fresh()
        };
        let resolved = resolve_datasets_to_refresh(&input);
        assert_eq!(resolved, BTreeSet::from([WeatherDataset::Hourly]));
    }

    #[test]
    fn test_age_equal_to_threshold_is_fresh() {
        let input = DatasetRefreshInput {
            current_updated_at_ms: NOW - 300_000,
            ..all_fresh()
        };
        assert!(!resolve_datasets_to_refresh(&input).contains(&WeatherDataset::Current));
    }

    #[test]
    fn test_age_one_past_threshold_is_stale() {
        let input = DatasetRefreshInput {
            current_updated_at_ms: NOW - 300_001,
            ..all_fresh()
        };
        assert_eq!(
            resolve_datasets_to_refresh(&input),
            BTreeSet::from([WeatherDataset::Current])
        );
    }

    #[test]
    fn test_datasets_are_judged_independently() {
        let input = DatasetRefreshInput {
            current_updated_at_ms: NOW - 10 * 60 * 1000,
            hourly_updated_at_ms: NOW - 10 * 60 * 1000,
            daily_updated_at_ms: NOW - 7 * 60 * 60 * 1000,
            ..all_fresh()
        };
        assert_eq!(
            resolve_datasets_to_refresh(&input),
            BTreeSet::from([WeatherDataset::Current, WeatherDataset::Daily])
        );
    }

    #[test]
    fn test_force_returns_every_dataset() {
        let input = DatasetRefreshInput {
            force: true,
            ..all_fresh()
        };
        assert_eq!(
            resolve_datasets_to_refresh(&input),
            WeatherDataset::ALL.into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_zero_threshold_refreshes_anything_older_than_now() {
        let input = DatasetRefreshInput {
            thresholds: FreshnessThresholds {
                current: Duration::ZERO,
                ..thresholds()
            },
            current_updated_at_ms: NOW,
            ..all_fresh()
        };
        assert!(resolve_datasets_to_refresh(&input).is_empty());

        let input = DatasetRefreshInput {
            current_updated_at_ms: NOW - 1,
            ..input
        };
        assert!(resolve_datasets_to_refresh(&input).contains(&WeatherDataset::Current));
    }
}
