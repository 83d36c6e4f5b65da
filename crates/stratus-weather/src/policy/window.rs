//! Sliding-window maintenance for the global request history.

use std::time::Duration;

/// Keep only the timestamps strictly inside the window ending at `now_ms`.
///
/// A timestamp exactly `window` old has left the window. Input order is
/// preserved, so a chronological history stays chronological.
pub fn prune_timestamps_within_window(
    timestamps: &[i64],
    now_ms: i64,
    window: Duration,
) -> Vec<i64> {
    let window_ms = window.as_millis() as i128;
    timestamps
        .iter()
        .copied()
        .filter(|&t| i128::from(now_ms) - i128::from(t) < window_ms)
        .collect()
}
