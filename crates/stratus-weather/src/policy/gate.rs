//! Request gate: may a network request for this location go out now?
//!
//! Three independent constraints apply:
//! - the location's backoff deadline after failed fetches
//! - a minimum interval between two requests for the same location
//! - a global cap on requests inside a sliding window, across all locations
//!
//! Every constraint is checked on every evaluation so the decision carries
//! all blocking reasons, not just the first one found.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::types::WeatherError;

/// Default minimum interval between requests for one location
pub const DEFAULT_LOCATION_MIN_INTERVAL_SECS: u64 = 30;
/// Default global window width
pub const DEFAULT_GLOBAL_WINDOW_SECS: u64 = 60;
/// Default number of requests allowed inside the global window
pub const DEFAULT_GLOBAL_LIMIT: u32 = 10;

/// Tunables for the request gate. All fields are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestGateConfig {
    location_min_request_interval: Duration,
    global_request_window: Duration,
    global_request_limit_per_window: u32,
}

impl RequestGateConfig {
    /// # Errors
    ///
    /// Returns [`WeatherError::InvalidPolicy`] if any value is zero.
    pub fn new(
        location_min_request_interval: Duration,
        global_request_window: Duration,
        global_request_limit_per_window: u32,
    ) -> Result<Self, WeatherError> {
        if location_min_request_interval.is_zero() {
            return Err(WeatherError::InvalidPolicy(
                "per-location request interval must be positive".to_string(),
            ));
        }
        if global_request_window.is_zero() {
            return Err(WeatherError::InvalidPolicy(
                "global request window must be positive".to_string(),
            ));
        }
        if global_request_limit_per_window == 0 {
            return Err(WeatherError::InvalidPolicy(
                "global request limit must be positive".to_string(),
            ));
        }
        Ok(Self {
            location_min_request_interval,
            global_request_window,
            global_request_limit_per_window,
        })
    }

    pub fn location_min_request_interval(&self) -> Duration {
        self.location_min_request_interval
    }

    pub fn global_request_window(&self) -> Duration {
        self.global_request_window
    }

    pub fn global_request_limit_per_window(&self) -> u32 {
        self.global_request_limit_per_window
    }
}

impl Default for RequestGateConfig {
    fn default() -> Self {
        Self {
            location_min_request_interval: Duration::from_secs(DEFAULT_LOCATION_MIN_INTERVAL_SECS),
            global_request_window: Duration::from_secs(DEFAULT_GLOBAL_WINDOW_SECS),
            global_request_limit_per_window: DEFAULT_GLOBAL_LIMIT,
        }
    }
}

/// Request-rate state for one location, computed by the caller right before
/// each evaluation. The global fields must come from an already pruned
/// history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestGateSnapshot {
    pub backoff_until_ms: Option<i64>,
    pub location_last_request_at_ms: Option<i64>,
    pub global_request_count: usize,
    pub global_oldest_request_at_ms: Option<i64>,
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockReason {
    Backoff,
    PerLocationLimit,
    GlobalLimit,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backoff => "backoff",
            Self::PerLocationLimit => "per-location limit",
            Self::GlobalLimit => "global limit",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub is_allowed: bool,
    pub reasons: BTreeSet<BlockReason>,
    /// Earliest instant every fired constraint has cleared. `None` when allowed.
    pub next_allowed_at_ms: Option<i64>,
}

impl GateDecision {
    fn allowed() -> Self {
        Self {
            is_allowed: true,
            reasons: BTreeSet::new(),
            next_allowed_at_ms: None,
        }
    }

    pub fn is_blocked_by(&self, reason: BlockReason) -> bool {
        self.reasons.contains(&reason)
    }

    /// Time left until a retry could pass, relative to `now_ms`.
    pub fn retry_after(&self, now_ms: i64) -> Option<Duration> {
        self.next_allowed_at_ms
            .map(|at| Duration::from_millis(u64::try_from(at.saturating_sub(now_ms)).unwrap_or(0)))
    }

    /// Reason tags joined for logs and status lines.
    pub fn reason_summary(&self) -> String {
        self.reasons
            .iter()
            .map(BlockReason::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Decide whether a request may be sent at `now_ms`.
pub fn evaluate_request_gate(
    now_ms: i64,
    snapshot: &RequestGateSnapshot,
    config: &RequestGateConfig,
) -> GateDecision {
    let mut blocks: Vec<(BlockReason, i64)> = Vec::with_capacity(3);

    if let Some(until) = snapshot.backoff_until_ms {
        if until > now_ms {
            blocks.push((BlockReason::Backoff, until));
        }
    }

    if let Some(last) = snapshot.location_last_request_at_ms {
        let interval_ms = duration_ms(config.location_min_request_interval);
        if now_ms.saturating_sub(last) < interval_ms {
            blocks.push((BlockReason::PerLocationLimit, last.saturating_add(interval_ms)));
        }
    }

    let limit = usize::try_from(config.global_request_limit_per_window).unwrap_or(usize::MAX);
    if snapshot.global_request_count >= limit {
        // A count at the limit without an oldest entry is an inconsistent
        // snapshot; the window check only fires when it can name an unblock time.
        if let Some(oldest) = snapshot.global_oldest_request_at_ms {
            let window_ms = duration_ms(config.global_request_window);
            blocks.push((BlockReason::GlobalLimit, oldest.saturating_add(window_ms)));
        }
    }

    if blocks.is_empty() {
        return GateDecision::allowed();
    }

    let decision = GateDecision {
        is_allowed: false,
        reasons: blocks.iter().map(|(reason, _)| *reason).collect(),
        next_allowed_at_ms: blocks.iter().map(|(_, at)| *at).max(),
    };
    tracing::trace!(
        "Request gate blocked ({}), next allowed at {:?}",
        decision.reason_summary(),
        decision.next_allowed_at_ms
    );
    decision
}
