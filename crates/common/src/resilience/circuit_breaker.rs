use crate::resilience::Rejection;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Current state of a circuit breaker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Outcome of one admitted call, as seen by the breaker.
///
/// `Excluded` covers outcomes the recoverable predicate matched: they are
/// not recorded in the rolling window at all, in either direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    Excluded,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure rate (percent of the full window) at which the breaker opens.
    pub failure_rate_threshold: f32,
    /// Number of call outcomes kept in the rolling window while closed.
    pub sliding_window_size: usize,
    /// How long the breaker stays open before probing is allowed again.
    pub wait_duration_in_open: Duration,
    /// Number of probe calls admitted while half-open.
    pub half_open_permits: usize,
    /// When true, an admission attempt after the wait duration moves the
    /// breaker to half-open on its own; when false it stays open until
    /// `force_half_open` is called.
    pub automatic_half_open: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 100,
            wait_duration_in_open: Duration::from_secs(60),
            half_open_permits: 10,
            automatic_half_open: true,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Rolling outcomes while closed; `true` marks a failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_in_flight: usize,
    probe_failures: usize,
    probes_completed: usize,
}

/// Failure-rate circuit breaker with a rolling closed-state window and a
/// bounded half-open probe budget. All state lives behind one mutex; the
/// breaker itself never blocks across a call.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                half_open_in_flight: 0,
                probe_failures: 0,
                probes_completed: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker mutex poisoned").state
    }

    /// Admission check, called before the wrapped call runs. In half-open
    /// state a probe slot is reserved; the matching `on_outcome` releases it.
    pub fn before_call(&self) -> Result<(), Rejection> {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");

        if inner.state == CircuitState::Open {
            let waited_out = inner
                .opened_at
                .is_some_and(|t| t.elapsed() >= self.config.wait_duration_in_open);
            if waited_out && self.config.automatic_half_open {
                self.enter_half_open(&mut inner);
            } else {
                return Err(Rejection::CircuitOpen {
                    name: self.name.clone(),
                });
            }
        }

        if inner.state == CircuitState::HalfOpen {
            if inner.half_open_in_flight + inner.probes_completed >= self.config.half_open_permits {
                return Err(Rejection::CircuitOpen {
                    name: self.name.clone(),
                });
            }
            inner.half_open_in_flight += 1;
        }

        Ok(())
    }

    /// Record the outcome of an admitted call.
    pub fn on_outcome(&self, outcome: CallOutcome) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");

        match inner.state {
            CircuitState::Closed => self.record_closed(&mut inner, outcome),
            CircuitState::HalfOpen => self.record_half_open(&mut inner, outcome),
            // A call admitted before the trip may complete afterwards; its
            // outcome no longer influences the open breaker.
            CircuitState::Open => {}
        }
    }

    /// Move an open breaker to half-open. The probing path when automatic
    /// transition is disabled.
    pub fn force_half_open(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        if inner.state == CircuitState::Open {
            self.enter_half_open(&mut inner);
        }
    }

    fn record_closed(&self, inner: &mut BreakerInner, outcome: CallOutcome) {
        let failed = match outcome {
            CallOutcome::Success => false,
            CallOutcome::Failure => true,
            CallOutcome::Excluded => {
                debug!(breaker = %self.name, "recoverable outcome excluded from window");
                return;
            }
        };

        inner.window.push_back(failed);
        while inner.window.len() > self.config.sliding_window_size {
            inner.window.pop_front();
        }

        if inner.window.len() == self.config.sliding_window_size
            && self.failure_rate(inner.window.iter().filter(|f| **f).count(), inner.window.len())
                >= self.config.failure_rate_threshold
        {
            inner.opened_at = Some(Instant::now());
            inner.window.clear();
            self.transition(inner, CircuitState::Open);
        }
    }

    fn record_half_open(&self, inner: &mut BreakerInner, outcome: CallOutcome) {
        inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);

        let failed = match outcome {
            CallOutcome::Success => false,
            CallOutcome::Failure => true,
            // The probe slot is released without consuming the budget.
            CallOutcome::Excluded => return,
        };

        inner.probes_completed += 1;
        if failed {
            inner.probe_failures += 1;
        }

        if inner.probes_completed >= self.config.half_open_permits {
            let rate = self.failure_rate(inner.probe_failures, inner.probes_completed);
            if rate >= self.config.failure_rate_threshold {
                inner.opened_at = Some(Instant::now());
                self.transition(inner, CircuitState::Open);
            } else {
                inner.opened_at = None;
                self.transition(inner, CircuitState::Closed);
            }
            inner.probe_failures = 0;
            inner.probes_completed = 0;
            inner.half_open_in_flight = 0;
        }
    }

    fn enter_half_open(&self, inner: &mut BreakerInner) {
        inner.half_open_in_flight = 0;
        inner.probe_failures = 0;
        inner.probes_completed = 0;
        self.transition(inner, CircuitState::HalfOpen);
    }

    fn failure_rate(&self, failures: usize, total: usize) -> f32 {
        if total == 0 {
            return 0.0;
        }
        failures as f32 * 100.0 / total as f32
    }

    fn transition(&self, inner: &mut BreakerInner, next: CircuitState) {
        if inner.state != next {
            warn!(
                breaker = %self.name,
                previous = ?inner.state,
                next = ?next,
                "circuit breaker state changed"
            );
            inner.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn breaker(window: usize, threshold: f32, wait: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_rate_threshold: threshold,
                sliding_window_size: window,
                wait_duration_in_open: wait,
                half_open_permits: 1,
                automatic_half_open: true,
            },
        )
    }

    #[test]
    fn opens_after_full_window_of_failures() {
        let breaker = breaker(2, 100.0, Duration::from_secs(60));

        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Failure);
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Failure);
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.before_call().is_err());
    }

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = breaker(2, 100.0, Duration::from_secs(60));

        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Failure);
        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Success);

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn excluded_outcomes_never_trip_the_breaker() {
        let breaker = breaker(2, 100.0, Duration::from_secs(60));

        for _ in 0..5 {
            breaker.before_call().unwrap();
            breaker.on_outcome(CallOutcome::Excluded);
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn recovers_through_half_open_probe() {
        let breaker = breaker(1, 100.0, Duration::from_millis(5));

        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Failure);
        assert_eq!(breaker.state(), CircuitState::Open);

        thread::sleep(Duration::from_millis(6));
        breaker.before_call().unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.on_outcome(CallOutcome::Success);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn failed_probe_reopens() {
        let breaker = breaker(1, 100.0, Duration::from_millis(5));

        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Failure);

        thread::sleep(Duration::from_millis(6));
        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Failure);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_budget_is_enforced() {
        let breaker = breaker(1, 100.0, Duration::from_millis(5));

        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Failure);

        thread::sleep(Duration::from_millis(6));
        breaker.before_call().unwrap();
        assert!(breaker.before_call().is_err());
    }

    #[test]
    fn manual_probe_required_when_automatic_transition_disabled() {
        let breaker = CircuitBreaker::new(
            "manual",
            CircuitBreakerConfig {
                failure_rate_threshold: 100.0,
                sliding_window_size: 1,
                wait_duration_in_open: Duration::from_millis(1),
                half_open_permits: 1,
                automatic_half_open: false,
            },
        );

        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Failure);
        assert_eq!(breaker.state(), CircuitState::Open);

        thread::sleep(Duration::from_millis(2));
        assert!(breaker.before_call().is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.force_half_open();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.before_call().unwrap();
        breaker.on_outcome(CallOutcome::Success);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
