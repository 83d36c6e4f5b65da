//! Refresh coordinator: owns the request history the pure policy needs.
//!
//! All mutable state sits behind one mutex that is never held across an
//! await point. The gate is advisory on its own, so the coordinator also
//! tracks an in-flight flag per location to keep at most one fetch running
//! for each.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::policy::{
    backoff_delay_for_failure, evaluate_request_gate, prune_timestamps_within_window,
    GateDecision, RequestGateSnapshot, RequestPolicy,
};
use crate::types::{LocationKey, WeatherError};

#[derive(Debug, Default, Clone)]
struct LocationState {
    last_request_at_ms: Option<i64>,
    consecutive_failures: u32,
    backoff_until_ms: Option<i64>,
    in_flight: bool,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    locations: HashMap<LocationKey, LocationState>,
    /// Chronological timestamps of requests across all locations
    request_history: Vec<i64>,
}

impl CoordinatorState {
    fn prune(&mut self, now_ms: i64, window: Duration) {
        if self.request_history.is_empty() {
            return;
        }
        self.request_history =
            prune_timestamps_within_window(&self.request_history, now_ms, window);
    }

    fn snapshot(&self, key: &LocationKey) -> RequestGateSnapshot {
        let location = self.locations.get(key);
        RequestGateSnapshot {
            backoff_until_ms: location.and_then(|l| l.backoff_until_ms),
            location_last_request_at_ms: location.and_then(|l| l.last_request_at_ms),
            global_request_count: self.request_history.len(),
            global_oldest_request_at_ms: self.request_history.first().copied(),
        }
    }
}

/// Read-only view of one location's request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationStatus {
    pub last_request_at_ms: Option<i64>,
    pub consecutive_failures: u32,
    pub backoff_until_ms: Option<i64>,
    pub in_flight: bool,
}

/// Result of trying to start a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    Blocked(GateDecision),
    InFlight,
}

/// Result of a gated fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome<T> {
    Fetched(T),
    Blocked(GateDecision),
    InFlight,
}

impl<T> RefreshOutcome<T> {
    pub fn fetched(self) -> Option<T> {
        match self {
            Self::Fetched(value) => Some(value),
            _ => None,
        }
    }
}

pub struct RefreshCoordinator<C: Clock = SystemClock> {
    policy: RequestPolicy,
    clock: C,
    state: Mutex<CoordinatorState>,
}

impl RefreshCoordinator<SystemClock> {
    pub fn new(policy: RequestPolicy) -> Self {
        Self::with_clock(policy, SystemClock)
    }
}

impl<C: Clock> RefreshCoordinator<C> {
    pub fn with_clock(policy: RequestPolicy, clock: C) -> Self {
        Self {
            policy,
            clock,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    pub fn policy(&self) -> &RequestPolicy {
        &self.policy
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Gate input for `key` at the current instant, after pruning history.
    pub fn snapshot(&self, key: &LocationKey) -> RequestGateSnapshot {
        let mut state = self.state.lock();
        let now_ms = self.clock.now_ms();
        state.prune(now_ms, self.policy.gate.global_request_window());
        state.snapshot(key)
    }

    /// Evaluate the gate for `key` without recording anything.
    pub fn evaluate(&self, key: &LocationKey) -> GateDecision {
        let mut state = self.state.lock();
        let now_ms = self.clock.now_ms();
        state.prune(now_ms, self.policy.gate.global_request_window());
        evaluate_request_gate(now_ms, &state.snapshot(key), &self.policy.gate)
    }

    /// Claim a request slot for `key` if the gate allows it.
    ///
    /// On success the request is counted against both the location and the
    /// global window, and the location is marked in flight until
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn try_begin(&self, key: &LocationKey) -> BeginOutcome {
        // Read under the lock so `request_history` stays in push order.
        let mut state = self.state.lock();
        let now_ms = self.clock.now_ms();

        if state.locations.get(key).is_some_and(|l| l.in_flight) {
            tracing::debug!("Refresh for {} already in flight", key);
            return BeginOutcome::InFlight;
        }

        state.prune(now_ms, self.policy.gate.global_request_window());
        let decision = evaluate_request_gate(now_ms, &state.snapshot(key), &self.policy.gate);
        if !decision.is_allowed {
            tracing::debug!(
                "Refresh for {} blocked: {} (next allowed at {:?})",
                key,
                decision.reason_summary(),
                decision.next_allowed_at_ms
            );
            return BeginOutcome::Blocked(decision);
        }

        state.request_history.push(now_ms);
        let location = state.locations.entry(key.clone()).or_default();
        location.last_request_at_ms = Some(now_ms);
        location.in_flight = true;
        tracing::debug!("Refresh for {} started", key);
        BeginOutcome::Started
    }

    /// Successful fetch: clears the failure streak and any backoff.
    pub fn record_success(&self, key: &LocationKey) {
        let mut state = self.state.lock();
        let location = state.locations.entry(key.clone()).or_default();
        if location.consecutive_failures > 0 {
            tracing::info!(
                "Refresh for {} recovered after {} failures",
                key,
                location.consecutive_failures
            );
        }
        location.in_flight = false;
        location.consecutive_failures = 0;
        location.backoff_until_ms = None;
    }

    /// Failed fetch: extends the failure streak and returns the backoff delay.
    pub fn record_failure(&self, key: &LocationKey) -> Duration {
        let mut state = self.state.lock();
        let now_ms = self.clock.now_ms();
        let location = state.locations.entry(key.clone()).or_default();
        location.in_flight = false;
        location.consecutive_failures = location.consecutive_failures.saturating_add(1);

        let delay = backoff_delay_for_failure(location.consecutive_failures, &self.policy.backoff);
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        location.backoff_until_ms = Some(now_ms.saturating_add(delay_ms));
        tracing::warn!(
            "Refresh for {} failed ({} in a row), backing off {:?}",
            key,
            location.consecutive_failures,
            delay
        );
        delay
    }

    /// Release an in-flight claim without counting an outcome.
    fn abandon(&self, key: &LocationKey) {
        if let Some(location) = self.state.lock().locations.get_mut(key) {
            location.in_flight = false;
        }
    }

    /// Drop all per-location state for `key`. Global history is kept.
    pub fn forget(&self, key: &LocationKey) {
        if self.state.lock().locations.remove(key).is_some() {
            tracing::debug!("Forgot request state for {}", key);
        }
    }

    pub fn status(&self, key: &LocationKey) -> Option<LocationStatus> {
        self.state.lock().locations.get(key).map(|l| LocationStatus {
            last_request_at_ms: l.last_request_at_ms,
            consecutive_failures: l.consecutive_failures,
            backoff_until_ms: l.backoff_until_ms,
            in_flight: l.in_flight,
        })
    }

    /// Run `fetch` for `key` if the gate allows it, recording the outcome.
    ///
    /// Only [`WeatherError::Fetch`] extends the failure streak. Any other
    /// error releases the in-flight claim without backing off.
    ///
    /// # Errors
    ///
    /// Returns the fetch error converted to [`WeatherError`].
    pub async fn refresh_with<T, E, F, Fut>(
        &self,
        key: &LocationKey,
        fetch: F,
    ) -> Result<RefreshOutcome<T>, WeatherError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<WeatherError>,
    {
        match self.try_begin(key) {
            BeginOutcome::Started => {}
            BeginOutcome::Blocked(decision) => return Ok(RefreshOutcome::Blocked(decision)),
            BeginOutcome::InFlight => return Ok(RefreshOutcome::InFlight),
        }

        let mut guard = InFlightGuard {
            coordinator: self,
            key,
            armed: true,
        };
        let result = fetch().await;
        guard.armed = false;

        match result {
            Ok(value) => {
                self.record_success(key);
                Ok(RefreshOutcome::Fetched(value))
            }
            Err(e) => {
                let err = e.into();
                if err.is_fetch_failure() {
                    self.record_failure(key);
                } else {
                    tracing::debug!("Refresh for {} aborted, not counted: {}", key, err);
                    self.abandon(key);
                }
                Err(err)
            }
        }
    }
}

/// Clears the in-flight flag if a fetch future is dropped before finishing.
struct InFlightGuard<'a, C: Clock> {
    coordinator: &'a RefreshCoordinator<C>,
    key: &'a LocationKey,
    armed: bool,
}

impl<C: Clock> Drop for InFlightGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Refresh for {} cancelled", self.key);
            self.coordinator.abandon(self.key);
        }
    }
}
