// triage-core/src/core/run_state.rs
// ============================================================================
// Module: Shared Run State
// Description: Mutex-guarded handle to the per-run mutable aggregate (§3, §5).
// Purpose: Give every worker thread a single, lock-discipline-safe entry
//          point onto `RunState`, instead of letting them share the mutex
//          directly.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Per spec §3's ownership note ("mutations from workers go through a
//! guarded interface") and §5's discipline table ("Run state ... Single
//! mutex; all read-modify-write atomic. Hot path: check
//! `tickets_created_count < cap` AND insert fingerprint in one critical
//! section"), this module is the only place [`RunState`] is mutated. Every
//! method takes and releases the lock in one call; nothing downstream ever
//! sees a raw `MutexGuard`.
//!
//! The ticket-creation hot path is a two-phase reservation: a fingerprint is
//! provisionally reserved (cap incremented, fingerprint inserted) before the
//! tracker is called, so that of two workers racing on the same fingerprint
//! exactly one reserves it and the other observes an in-run duplicate on its
//! next strategy pass (§8). If the tracker call then fails, the caller rolls
//! the reservation back via [`SharedRunState::release_reservation`], leaving
//! `RunState` exactly as it was before the attempt (§4.I step 7).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use time::OffsetDateTime;

use crate::core::identifiers::Fingerprint;
use crate::core::identifiers::Loghash;
use crate::core::model::RunState;
use crate::core::model::RunStatistics;

// ============================================================================
// SECTION: Reservation Outcome
// ============================================================================

/// Result of attempting to reserve a ticket-creation slot for a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The slot was reserved: the cap was not yet reached and this is the
    /// first reservation for this fingerprint in the run. The caller may
    /// proceed to call the tracker.
    Reserved,
    /// The per-run cap had already been reached; no mutation occurred.
    CapReached,
    /// Another task already reserved (or created a ticket for) this
    /// fingerprint earlier in the run; no mutation occurred.
    AlreadyReservedThisRun,
}

// ============================================================================
// SECTION: Shared Run State
// ============================================================================

/// Cheaply cloneable, mutex-guarded handle to a single run's [`RunState`].
#[derive(Clone)]
pub struct SharedRunState {
    /// The guarded state.
    inner: Arc<Mutex<RunState>>,
}

impl SharedRunState {
    /// Creates a fresh run state with the given per-run ticket cap.
    #[must_use]
    pub fn new(max_tickets_per_run: u64) -> Self {
        Self { inner: Arc::new(Mutex::new(RunState::new(max_tickets_per_run))) }
    }

    /// Checks whether `loghash` was already observed earlier in this run
    /// (component D1's pre-analysis check); if not, marks it as seen. Both
    /// the check and the mark happen under one lock acquisition so two
    /// workers racing on the same loghash cannot both observe `false`.
    #[must_use]
    pub fn check_and_mark_loghash_seen(&self, loghash: &Loghash) -> bool {
        let Ok(mut state) = self.inner.lock() else { return false };
        if state.seen_loghashes.contains(loghash) {
            true
        } else {
            state.seen_loghashes.insert(loghash.clone());
            false
        }
    }

    /// Returns true if `fingerprint` has already been reserved or created in
    /// this run, without mutating anything. Backs the local half of
    /// component D2 (`FingerprintCache`'s `source = local` branch).
    #[must_use]
    pub fn fingerprint_seen_locally(&self, fingerprint: &Fingerprint) -> bool {
        let Ok(state) = self.inner.lock() else { return false };
        state.created_fingerprints.contains(fingerprint)
    }

    /// Attempts to reserve a ticket-creation slot for `fingerprint`: checks
    /// the per-run cap and the in-run fingerprint set, and if both checks
    /// pass, inserts the fingerprint and increments the created count, all
    /// under one lock acquisition (§5's hot-path critical section).
    #[must_use]
    pub fn reserve_ticket_slot(&self, fingerprint: &Fingerprint) -> ReserveOutcome {
        let Ok(mut state) = self.inner.lock() else { return ReserveOutcome::CapReached };
        if state.created_fingerprints.contains(fingerprint) {
            return ReserveOutcome::AlreadyReservedThisRun;
        }
        if state.cap_reached() {
            return ReserveOutcome::CapReached;
        }
        state.created_fingerprints.insert(fingerprint.clone());
        state.tickets_created_count += 1;
        ReserveOutcome::Reserved
    }

    /// Reserves `fingerprint` for a dry-run (simulated) ticket: still honors
    /// the per-run cap and still marks the fingerprint seen for in-run dedup,
    /// but does not increment `tickets_created_count`, since no ticket is
    /// actually created (§4.I step 5a).
    #[must_use]
    pub fn reserve_simulation_slot(&self, fingerprint: &Fingerprint) -> ReserveOutcome {
        let Ok(mut state) = self.inner.lock() else { return ReserveOutcome::CapReached };
        if state.created_fingerprints.contains(fingerprint) {
            return ReserveOutcome::AlreadyReservedThisRun;
        }
        if state.cap_reached() {
            return ReserveOutcome::CapReached;
        }
        state.created_fingerprints.insert(fingerprint.clone());
        ReserveOutcome::Reserved
    }

    /// Rolls back a reservation made by [`Self::reserve_ticket_slot`] after
    /// the tracker call that was supposed to follow it failed, restoring
    /// `RunState` to how it was before the reservation (§4.I step 7).
    pub fn release_reservation(&self, fingerprint: &Fingerprint) {
        let Ok(mut state) = self.inner.lock() else { return };
        if state.created_fingerprints.remove(fingerprint) {
            state.tickets_created_count = state.tickets_created_count.saturating_sub(1);
        }
    }

    /// Returns the timestamp of the last comment added for `fingerprint`, if any.
    #[must_use]
    pub fn last_comment_at(&self, fingerprint: &Fingerprint) -> Option<OffsetDateTime> {
        let Ok(state) = self.inner.lock() else { return None };
        state.comment_timestamps.get(fingerprint).copied()
    }

    /// Records that a comment was just added for `fingerprint` at `now`.
    pub fn record_comment(&self, fingerprint: &Fingerprint, now: OffsetDateTime) {
        let Ok(mut state) = self.inner.lock() else { return };
        state.comment_timestamps.insert(fingerprint.clone(), now);
    }

    /// Applies `mutator` to the shared statistics counters under one lock
    /// acquisition, so multi-field updates (e.g. a match plus a skip) stay
    /// consistent with each other.
    pub fn update_statistics(&self, mutator: impl FnOnce(&mut RunStatistics)) {
        let Ok(mut state) = self.inner.lock() else { return };
        mutator(&mut state.statistics);
    }

    /// Returns a snapshot of the current statistics counters.
    #[must_use]
    pub fn statistics_snapshot(&self) -> RunStatistics {
        self.inner.lock().map(|state| state.statistics).unwrap_or_default()
    }

    /// Returns the number of tickets created (or reserved) so far this run.
    #[must_use]
    pub fn tickets_created_count(&self) -> u64 {
        self.inner.lock().map(|state| state.tickets_created_count).unwrap_or(0)
    }

    /// Returns the configured per-run ticket cap.
    #[must_use]
    pub fn max_tickets_per_run(&self) -> u64 {
        self.inner.lock().map(|state| state.max_tickets_per_run).unwrap_or(0)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ReserveOutcome;
    use super::SharedRunState;
    use crate::core::identifiers::Fingerprint;
    use crate::core::identifiers::Loghash;

    #[test]
    fn loghash_seen_check_is_atomic_check_then_mark() {
        let run_state = SharedRunState::new(5);
        let loghash = Loghash::new("abc123def456");
        assert!(!run_state.check_and_mark_loghash_seen(&loghash));
        assert!(run_state.check_and_mark_loghash_seen(&loghash));
    }

    #[test]
    fn reserve_then_release_restores_state() {
        let run_state = SharedRunState::new(5);
        let fingerprint = Fingerprint::new("abc123def456");
        assert_eq!(run_state.reserve_ticket_slot(&fingerprint), ReserveOutcome::Reserved);
        assert_eq!(run_state.tickets_created_count(), 1);
        run_state.release_reservation(&fingerprint);
        assert_eq!(run_state.tickets_created_count(), 0);
        assert!(!run_state.fingerprint_seen_locally(&fingerprint));
    }

    #[test]
    fn second_reservation_of_same_fingerprint_is_rejected() {
        let run_state = SharedRunState::new(5);
        let fingerprint = Fingerprint::new("abc123def456");
        assert_eq!(run_state.reserve_ticket_slot(&fingerprint), ReserveOutcome::Reserved);
        assert_eq!(
            run_state.reserve_ticket_slot(&fingerprint),
            ReserveOutcome::AlreadyReservedThisRun
        );
    }

    #[test]
    fn cap_reached_rejects_new_reservations() {
        let run_state = SharedRunState::new(1);
        let first = Fingerprint::new("abc123def456");
        let second = Fingerprint::new("def456abc123");
        assert_eq!(run_state.reserve_ticket_slot(&first), ReserveOutcome::Reserved);
        assert_eq!(run_state.reserve_ticket_slot(&second), ReserveOutcome::CapReached);
    }

    #[test]
    fn simulation_slot_does_not_consume_the_cap() {
        let run_state = SharedRunState::new(1);
        let first = Fingerprint::new("abc123def456");
        let second = Fingerprint::new("def456abc123");
        assert_eq!(run_state.reserve_simulation_slot(&first), ReserveOutcome::Reserved);
        assert_eq!(run_state.tickets_created_count(), 0);
        assert_eq!(run_state.reserve_simulation_slot(&second), ReserveOutcome::Reserved);
        assert_eq!(run_state.tickets_created_count(), 0);
        assert!(run_state.fingerprint_seen_locally(&first));
        assert!(run_state.fingerprint_seen_locally(&second));
    }

    #[test]
    fn simulation_slot_still_rejects_duplicates_in_run() {
        let run_state = SharedRunState::new(5);
        let fingerprint = Fingerprint::new("abc123def456");
        assert_eq!(run_state.reserve_simulation_slot(&fingerprint), ReserveOutcome::Reserved);
        assert_eq!(
            run_state.reserve_simulation_slot(&fingerprint),
            ReserveOutcome::AlreadyReservedThisRun
        );
    }
}
