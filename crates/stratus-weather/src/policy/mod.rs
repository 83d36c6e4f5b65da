//! Weather request policy: pure decisions over caller-owned state.
//!
//! Nothing in this module reads a clock, performs IO, or keeps state
//! between calls. [`crate::coordinator::RefreshCoordinator`] is the
//! stateful caller that feeds it.

pub mod backoff;
pub mod freshness;
pub mod gate;
pub mod window;

pub use backoff::{backoff_delay_for_failure, BackoffSchedule, DEFAULT_BACKOFF_STEPS_SECS};
pub use freshness::{resolve_datasets_to_refresh, DatasetRefreshInput, FreshnessThresholds};
pub use gate::{
    evaluate_request_gate, BlockReason, GateDecision, RequestGateConfig, RequestGateSnapshot,
};
pub use window::prune_timestamps_within_window;

/// Everything the coordinator needs to apply the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPolicy {
    pub thresholds: FreshnessThresholds,
    pub gate: RequestGateConfig,
    pub backoff: BackoffSchedule,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        use std::time::Duration;

        Self {
            thresholds: FreshnessThresholds {
                current: Duration::from_secs(10 * 60),
                hourly: Duration::from_secs(60 * 60),
                daily: Duration::from_secs(6 * 60 * 60),
            },
            gate: RequestGateConfig::default(),
            backoff: BackoffSchedule::default(),
        }
    }
}
