// triage-analysis/src/breaker.rs
// ============================================================================
// Module: Circuit Breaker
// Description: Closed/Open/HalfOpen guard in front of the LLM client (component F).
// Purpose: Stop hammering a failing LLM endpoint and give it time to recover.
// Dependencies: triage-core
// ============================================================================

//! ## Overview
//! A classic three-state breaker, guarded by the same single-mutex,
//! whole-transition-under-one-lock discipline [`triage_core::SharedRunState`]
//! uses for run state (see that module's overview): every state read and
//! every state transition happens inside one lock acquisition, so two
//! threads racing on the same breaker can never both observe `Closed` and
//! both proceed past a trip that should have happened.
//!
//! `Closed` accumulates consecutive failures and trips to `Open` at
//! `failure_threshold`. `Open` rejects every call until `timeout_seconds`
//! has elapsed, then allows up to `half_open_max_calls` probe calls through
//! as `HalfOpen`. Every probe succeeding closes the breaker again; any probe
//! failing re-opens it immediately. A cancelled call is never counted as a
//! success or a failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use triage_config::CircuitBreakerConfig;
use triage_core::ProviderError;

use crate::error::BreakerError;

// ============================================================================
// SECTION: State
// ============================================================================

/// Observable state of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass straight through; failures accumulate.
    Closed,
    /// Calls are rejected until the timeout elapses.
    Open,
    /// A bounded number of probe calls are allowed through.
    HalfOpen,
}

/// Mutable breaker bookkeeping, held behind one mutex.
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_issued: u32,
    half_open_successes: u32,
}

impl Inner {
    const fn new() -> Self {
        Self { state: BreakerState::Closed, consecutive_failures: 0, opened_at: None, half_open_issued: 0, half_open_successes: 0 }
    }
}

// ============================================================================
// SECTION: Permit
// ============================================================================

/// Whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permit {
    Allowed,
    Denied,
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Guards a flaky external call (the LLM client) behind a Closed/Open/HalfOpen
/// state machine.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a new breaker in the `Closed` state.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, inner: Mutex::new(Inner::new()) }
    }

    /// Returns the breaker's current state, resolving a lapsed `Open` timeout
    /// into `HalfOpen` as a side effect, matching [`Self::call`]'s own check.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        let Ok(mut inner) = self.inner.lock() else { return BreakerState::Open };
        self.maybe_resolve_timeout(&mut inner);
        inner.state
    }

    /// Runs `f` through the breaker.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::CircuitOpen`] if the breaker rejected the call
    /// before attempting it, or [`BreakerError::Call`] if `f` itself failed.
    /// A call that fails with [`ProviderError::Cancelled`] is reported back
    /// as-is but is never counted toward the breaker's failure accounting.
    pub fn call<T>(&self, f: impl FnOnce() -> Result<T, ProviderError>) -> Result<T, BreakerError> {
        if self.acquire() == Permit::Denied {
            return Err(BreakerError::CircuitOpen);
        }
        match f() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(ProviderError::Cancelled) => Err(BreakerError::Call(ProviderError::Cancelled)),
            Err(err) => {
                self.on_failure();
                Err(BreakerError::Call(err))
            }
        }
    }

    /// Resolves an `Open` breaker whose timeout has elapsed into `HalfOpen`,
    /// resetting the probe counters. Must be called with the lock held.
    fn maybe_resolve_timeout(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open {
            let elapsed = inner.opened_at.is_some_and(|opened_at| {
                opened_at.elapsed() >= Duration::from_secs(self.config.timeout_seconds)
            });
            if elapsed {
                inner.state = BreakerState::HalfOpen;
                inner.half_open_issued = 0;
                inner.half_open_successes = 0;
            }
        }
    }

    /// Decides whether a call may proceed, issuing a half-open probe slot if so.
    fn acquire(&self) -> Permit {
        let Ok(mut inner) = self.inner.lock() else { return Permit::Denied };
        self.maybe_resolve_timeout(&mut inner);
        match inner.state {
            BreakerState::Closed => Permit::Allowed,
            BreakerState::Open => Permit::Denied,
            BreakerState::HalfOpen => {
                if inner.half_open_issued < self.config.half_open_max_calls {
                    inner.half_open_issued += 1;
                    Permit::Allowed
                } else {
                    Permit::Denied
                }
            }
        }
    }

    /// Records a successful call.
    fn on_success(&self) {
        let Ok(mut inner) = self.inner.lock() else { return };
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_max_calls {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Records a failed call.
    fn on_failure(&self) {
        let Ok(mut inner) = self.inner.lock() else { return };
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_issued = 0;
                inner.half_open_successes = 0;
            }
            BreakerState::Open => {}
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use triage_config::CircuitBreakerConfig;
    use triage_core::ProviderError;

    use super::BreakerError;
    use super::BreakerState;
    use super::CircuitBreaker;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig { failure_threshold: 2, timeout_seconds: 1, half_open_max_calls: 2 }
    }

    #[test]
    fn trips_open_after_threshold_failures() {
        let breaker = CircuitBreaker::new(config());
        let _ = breaker.call(|| Err::<(), _>(ProviderError::Transient("x".to_string())));
        assert_eq!(breaker.state(), BreakerState::Closed);
        let _ = breaker.call(|| Err::<(), _>(ProviderError::Transient("x".to_string())));
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn open_breaker_rejects_calls_without_invoking_them() {
        let breaker = CircuitBreaker::new(config());
        let _ = breaker.call(|| Err::<(), _>(ProviderError::Transient("x".to_string())));
        let _ = breaker.call(|| Err::<(), _>(ProviderError::Transient("x".to_string())));
        let mut invoked = false;
        let result = breaker.call(|| {
            invoked = true;
            Ok(())
        });
        assert!(!invoked);
        assert!(matches!(result, Err(BreakerError::CircuitOpen)));
    }

    #[test]
    fn cancelled_call_is_not_counted_as_a_failure() {
        let breaker = CircuitBreaker::new(config());
        let _ = breaker.call(|| Err::<(), _>(ProviderError::Cancelled));
        let _ = breaker.call(|| Err::<(), _>(ProviderError::Cancelled));
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_success_closes_breaker() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            timeout_seconds: 0,
            half_open_max_calls: 1,
        });
        let _ = breaker.call(|| Err::<(), _>(ProviderError::Transient("x".to_string())));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        let result = breaker.call(|| Ok::<_, ProviderError>(()));
        assert!(result.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens_breaker() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            timeout_seconds: 0,
            half_open_max_calls: 1,
        });
        let _ = breaker.call(|| Err::<(), _>(ProviderError::Transient("x".to_string())));
        let result = breaker.call(|| Err::<(), _>(ProviderError::Transient("x".to_string())));
        assert!(matches!(result, Err(BreakerError::Call(_))));
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
