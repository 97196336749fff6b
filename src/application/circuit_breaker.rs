//! Circuit breaker for upstream failure isolation.
//!
//! # States
//!
//! ```text
//! Closed    → Open:      failure rate >= threshold over the rolling window
//! Open      → Half-Open: open timeout elapsed (checked on the next call)
//! Half-Open → Closed:    probe call succeeds
//! Half-Open → Open:      probe call fails
//! ```
//!
//! While open, the guarded call is not attempted and the caller receives
//! [`CircuitError::Open`]. Half-open admits exactly one probe at a time; other
//! calls are short-circuited until the probe settles.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Configuration shared by every breaker of a [`CircuitBreakers`] registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failure percentage (0-100] at which a closed circuit opens.
    pub failure_rate_threshold: f64,
    /// Number of most recent outcomes considered.
    pub sliding_window_size: usize,
    /// Outcomes required in the window before the rate is evaluated.
    pub minimum_calls: usize,
    /// Time an open circuit waits before admitting a probe.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 10,
            minimum_calls: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

/// State of a single circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Error returned by a guarded call.
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// The call was short-circuited without being attempted.
    #[error("CircuitBreaker '{name}' is OPEN and does not permit further calls")]
    Open { name: String },

    /// The call was attempted and failed.
    #[error(transparent)]
    Call(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    /// `true` marks a failed call.
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// A named circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                outcomes: VecDeque::with_capacity(config.sliding_window_size),
                opened_at: None,
                probe_in_flight: false,
            }),
            config,
        }
    }

    /// Current state as last transitioned.
    ///
    /// An open circuit whose timeout has elapsed still reports `Open` until
    /// the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Runs `call` through the breaker.
    ///
    /// # Errors
    ///
    /// - [`CircuitError::Open`] when the circuit rejects the call; `call` is
    ///   never invoked in that case.
    /// - [`CircuitError::Call`] wrapping the error returned by `call`.
    pub async fn call<T, E, F, Fut>(&self, call: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.try_acquire().ok_or_else(|| CircuitError::Open {
            name: self.name.clone(),
        })?;

        let mut guard = ProbeGuard {
            breaker: self,
            armed: admission == Admission::Probe,
        };
        let result = call().await;
        guard.armed = false;

        match &result {
            Ok(_) => self.on_success(admission),
            Err(_) => self.on_failure(admission),
        }

        result.map_err(CircuitError::Call)
    }

    /// Runs `call` through the breaker, substituting `fallback` for any
    /// failure, whether short-circuited or raised by the call itself.
    pub async fn call_or_else<T, E, F, Fut, G>(&self, call: F, fallback: G) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce(CircuitError<E>) -> T,
    {
        match self.call(call).await {
            Ok(value) => value,
            Err(cause) => fallback(cause),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self) -> Option<Admission> {
        let mut st = self.lock();
        match st.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let elapsed = st
                    .opened_at
                    .is_none_or(|opened_at| opened_at.elapsed() >= self.config.open_timeout);
                if elapsed {
                    self.transition(&mut st, CircuitState::HalfOpen);
                    st.probe_in_flight = true;
                    Some(Admission::Probe)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen if st.probe_in_flight => None,
            CircuitState::HalfOpen => {
                st.probe_in_flight = true;
                Some(Admission::Probe)
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut st = self.lock();
        match (admission, st.state) {
            (Admission::Probe, _) => {
                st.probe_in_flight = false;
                self.transition(&mut st, CircuitState::Closed);
            }
            (Admission::Normal, CircuitState::Closed) => self.record(&mut st, false),
            // Late completion of a call admitted before the circuit opened.
            (Admission::Normal, _) => {}
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut st = self.lock();
        match (admission, st.state) {
            (Admission::Probe, _) => {
                st.probe_in_flight = false;
                warn!(breaker = %self.name, "Probe call failed, reopening circuit");
                self.transition(&mut st, CircuitState::Open);
            }
            (Admission::Normal, CircuitState::Closed) => self.record(&mut st, true),
            (Admission::Normal, _) => {}
        }
    }

    fn record(&self, st: &mut BreakerState, failed: bool) {
        st.outcomes.push_back(failed);
        while st.outcomes.len() > self.config.sliding_window_size {
            st.outcomes.pop_front();
        }

        let calls = st.outcomes.len();
        if calls < self.config.minimum_calls {
            return;
        }

        let failures = st.outcomes.iter().filter(|failed| **failed).count();
        let failure_rate = failures as f64 * 100.0 / calls as f64;
        if failure_rate >= self.config.failure_rate_threshold {
            warn!(
                breaker = %self.name,
                failure_rate,
                calls,
                "Failure rate exceeded threshold"
            );
            self.transition(st, CircuitState::Open);
        }
    }

    fn transition(&self, st: &mut BreakerState, to: CircuitState) {
        let from = st.state;
        if from == to {
            return;
        }

        st.state = to;
        match to {
            CircuitState::Open => st.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                st.opened_at = None;
                st.outcomes.clear();
            }
            CircuitState::HalfOpen => {}
        }

        info!(
            breaker = %self.name,
            from = from.as_str(),
            to = to.as_str(),
            "Circuit breaker state changed"
        );
        metrics::counter!(
            "circuit_breaker_transitions_total",
            "breaker" => self.name.clone(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

/// Releases the half-open probe slot if the probe future is dropped before
/// it completes.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().probe_in_flight = false;
        }
    }
}

/// Registry of breakers keyed by operation name.
#[derive(Debug, Default)]
pub struct CircuitBreakers {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the breaker for `name`, creating it closed on first use.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    /// Name and state of every breaker created so far, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut states: Vec<_> = breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
