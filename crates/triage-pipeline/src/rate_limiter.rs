// triage-pipeline/src/rate_limiter.rs
// ============================================================================
// Module: Rate Limiter
// Description: Condvar-backed token bucket gating external-call throughput
//              across the worker pool (component J).
// Purpose: Give every worker the same shared call budget without a busy loop.
// ============================================================================

//! ## Overview
//! One token refills per `1 / rate_per_second` seconds, up to a burst
//! capacity of one second's worth of tokens. [`RateLimiter::acquire`] blocks
//! a worker thread until a token is available, the calling task's deadline
//! passes, or the run is cancelled, whichever comes first. Waiting threads
//! wake on a [`Condvar`] rather than spinning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Condvar;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of attempting to acquire a rate-limiter token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A token was acquired; the caller may proceed.
    Acquired,
    /// The run was cancelled before a token became available.
    Cancelled,
    /// `deadline` passed before a token became available.
    TimedOut,
}

// ============================================================================
// SECTION: Token Bucket State
// ============================================================================

/// Mutable state guarded by [`RateLimiter::state`].
struct BucketState {
    /// Tokens currently available, fractional between refills.
    tokens: f64,
    /// Instant the bucket was last refilled.
    last_refill: Instant,
}

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// A token bucket shared by every worker in a pipeline run.
pub struct RateLimiter {
    /// Guarded bucket state.
    state: Mutex<BucketState>,
    /// Signals waiters after every refill or token release.
    condvar: Condvar,
    /// Configured refill rate and burst capacity, in tokens per second.
    rate_per_second: f64,
}

impl RateLimiter {
    /// Creates a bucket with burst capacity equal to one second's worth of
    /// tokens at `rate_per_second`, starting full.
    #[must_use]
    pub fn new(rate_per_second: f64) -> Self {
        let capacity = rate_per_second.max(1.0);
        Self {
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
            condvar: Condvar::new(),
            rate_per_second: capacity,
        }
    }

    /// Blocks until a token is available, `deadline` passes, or `cancel` is
    /// set, whichever comes first.
    pub fn acquire(&self, deadline: Instant, cancel: &AtomicBool) -> AcquireOutcome {
        loop {
            if cancel.load(Ordering::Relaxed) {
                return AcquireOutcome::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return AcquireOutcome::TimedOut;
            }
            let Ok(mut guard) = self.state.lock() else { return AcquireOutcome::TimedOut };
            self.refill(&mut guard, now);
            if guard.tokens >= 1.0 {
                guard.tokens -= 1.0;
                drop(guard);
                self.condvar.notify_all();
                return AcquireOutcome::Acquired;
            }
            let deficit = 1.0 - guard.tokens;
            let wait_for = Duration::from_secs_f64((deficit / self.rate_per_second).max(0.001));
            let remaining = deadline.saturating_duration_since(now);
            let capped = wait_for.min(remaining).min(Duration::from_millis(50));
            let _ = self.condvar.wait_timeout(guard, capped);
        }
    }

    /// Adds tokens earned since `last_refill`, capped at burst capacity.
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.rate_per_second);
            state.last_refill = now;
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use std::time::Instant;

    use super::AcquireOutcome;
    use super::RateLimiter;

    #[test]
    fn first_calls_up_to_capacity_do_not_block() {
        let limiter = RateLimiter::new(5.0);
        let cancel = AtomicBool::new(false);
        let deadline = Instant::now() + Duration::from_secs(1);
        for _ in 0..5 {
            assert_eq!(limiter.acquire(deadline, &cancel), AcquireOutcome::Acquired);
        }
    }

    #[test]
    fn cancellation_is_observed_even_when_starved() {
        let limiter = RateLimiter::new(1.0);
        let cancel = AtomicBool::new(false);
        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(limiter.acquire(deadline, &cancel), AcquireOutcome::Acquired);
        cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        assert_eq!(limiter.acquire(deadline, &cancel), AcquireOutcome::Cancelled);
    }

    #[test]
    fn deadline_in_the_past_times_out_immediately() {
        let limiter = RateLimiter::new(1.0);
        let cancel = AtomicBool::new(false);
        let deadline = Instant::now() - Duration::from_secs(1);
        assert_eq!(limiter.acquire(deadline, &cancel), AcquireOutcome::TimedOut);
    }
}
