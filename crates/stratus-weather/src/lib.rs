//! Weather refresh policy for Stratus
//!
//! Decides which weather datasets are stale for a location and whether a
//! network request may go out now, and keeps the per-location request state
//! and the dataset cache those decisions are computed from.

pub mod types;
pub mod cache;
pub mod clock;
pub mod coordinator;
pub mod policy;

pub use types::*;
pub use cache::{CachedDataset, WeatherCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{BeginOutcome, LocationStatus, RefreshCoordinator, RefreshOutcome};
pub use policy::{
    backoff_delay_for_failure, evaluate_request_gate, prune_timestamps_within_window,
    resolve_datasets_to_refresh, BackoffSchedule, BlockReason, DatasetRefreshInput,
    FreshnessThresholds, GateDecision, RequestGateConfig, RequestGateSnapshot, RequestPolicy,
};
