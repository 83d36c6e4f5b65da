//! Escalating delay after consecutive fetch failures.
//!
//! The schedule is a fixed table of steps: the first failure waits
//! `steps[0]`, the second `steps[1]`, and so on. Once the failure count
//! runs past the table the last step is reused, so the delay plateaus
//! instead of growing without bound.

use std::time::Duration;

use crate::types::WeatherError;

/// Default steps: 5s, 15s, 1m, 5m
pub const DEFAULT_BACKOFF_STEPS_SECS: [u64; 4] = [5, 15, 60, 300];

/// Non-empty, ordered table of backoff delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    steps: Vec<Duration>,
}

impl BackoffSchedule {
    /// # Errors
    ///
    /// Returns [`WeatherError::InvalidPolicy`] if `steps` is empty.
    pub fn new(steps: Vec<Duration>) -> Result<Self, WeatherError> {
        if steps.is_empty() {
            return Err(WeatherError::InvalidPolicy(
                "backoff schedule needs at least one step".to_string(),
            ));
        }
        if steps.windows(2).any(|pair| pair[1] < pair[0]) {
            tracing::warn!("Backoff steps are not ascending: {:?}", steps);
        }
        Ok(Self { steps })
    }

    /// # Errors
    ///
    /// Returns [`WeatherError::InvalidPolicy`] if `steps` is empty.
    pub fn from_secs(steps: &[u64]) -> Result<Self, WeatherError> {
        Self::new(steps.iter().copied().map(Duration::from_secs).collect())
    }

    pub fn steps(&self) -> &[Duration] {
        &self.steps
    }

    /// Longest delay the schedule can produce.
    pub fn max_delay(&self) -> Duration {
        self.steps[self.steps.len() - 1]
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            steps: DEFAULT_BACKOFF_STEPS_SECS
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}

/// Delay before the next request is permitted after `consecutive_failures`
/// failures in a row (1-based).
pub fn backoff_delay_for_failure(
    consecutive_failures: u32,
    schedule: &BackoffSchedule,
) -> Duration {
    debug_assert!(
        consecutive_failures >= 1,
        "backoff is only defined after at least one failure"
    );
    let steps = schedule.steps();
    let count = usize::try_from(consecutive_failures).unwrap_or(usize::MAX);
    let index = count.min(steps.len()).saturating_sub(1);
    steps[index]
}
