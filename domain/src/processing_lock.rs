//! Process-local mutual exclusion and retry accounting for call processing.
//!
//! Overlapping pipeline invocations (page loads, timers, manual retries)
//! share one of these per process. All mutation happens synchronously under
//! a std `Mutex` so a check-and-insert can never straddle an await point.
//! In-flight entries are cleared at the end of each top-level run; failure
//! counts persist for the process lifetime so the retry ceiling holds across
//! discovery cycles. None of this state survives a restart and it does not
//! coordinate across process instances, which is a known single-instance
//! limitation of this deployment model.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct LockState {
    in_flight: HashSet<String>,
    failed_attempts: HashMap<String, u32>,
}

#[derive(Debug, Default)]
pub struct ProcessingLock {
    state: Mutex<LockState>,
}

impl ProcessingLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `contact_id` for processing. Returns false when another
    /// invocation already holds it.
    pub fn try_acquire(&self, contact_id: &str) -> bool {
        let mut state = self.lock_state();
        state.in_flight.insert(contact_id.to_string())
    }

    /// Releases `contact_id` after a successful run and forgets any previous
    /// failures for it.
    pub fn release_success(&self, contact_id: &str) {
        let mut state = self.lock_state();
        state.in_flight.remove(contact_id);
        state.failed_attempts.remove(contact_id);
    }

    /// Releases `contact_id` after a failed run, incrementing its failure
    /// count. Returns the new count.
    pub fn release_failure(&self, contact_id: &str) -> u32 {
        let mut state = self.lock_state();
        state.in_flight.remove(contact_id);
        let attempts = state
            .failed_attempts
            .entry(contact_id.to_string())
            .or_insert(0);
        *attempts += 1;
        *attempts
    }

    pub fn is_locked(&self, contact_id: &str) -> bool {
        self.lock_state().in_flight.contains(contact_id)
    }

    pub fn failed_attempts(&self, contact_id: &str) -> u32 {
        self.lock_state()
            .failed_attempts
            .get(contact_id)
            .copied()
            .unwrap_or(0)
    }

    /// True once `contact_id` has failed `max_attempts` times and is no
    /// longer eligible for automatic reprocessing.
    pub fn has_exhausted_retries(&self, contact_id: &str, max_attempts: u32) -> bool {
        self.failed_attempts(contact_id) >= max_attempts
    }

    /// Drops every in-flight claim. Called at the end of a top-level run so
    /// a crashed caller cannot permanently wedge its calls. Failure counts
    /// are deliberately left intact.
    pub fn clear_in_flight(&self) {
        self.lock_state().in_flight.clear();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive_until_released() {
        let lock = ProcessingLock::new();

        assert!(lock.try_acquire("contact-1"));
        assert!(!lock.try_acquire("contact-1"));
        assert!(lock.is_locked("contact-1"));

        lock.release_success("contact-1");
        assert!(!lock.is_locked("contact-1"));
        assert!(lock.try_acquire("contact-1"));
    }

    #[test]
    fn failures_accumulate_to_the_retry_ceiling() {
        let lock = ProcessingLock::new();

        for expected in 1..=3 {
            assert!(lock.try_acquire("contact-1"));
            assert_eq!(lock.release_failure("contact-1"), expected);
        }

        assert!(lock.has_exhausted_retries("contact-1", 3));
        assert!(!lock.has_exhausted_retries("contact-2", 3));
    }

    #[test]
    fn success_resets_the_failure_count() {
        let lock = ProcessingLock::new();

        lock.try_acquire("contact-1");
        lock.release_failure("contact-1");
        assert_eq!(lock.failed_attempts("contact-1"), 1);

        lock.try_acquire("contact-1");
        lock.release_success("contact-1");
        assert_eq!(lock.failed_attempts("contact-1"), 0);
    }

    #[test]
    fn clearing_in_flight_preserves_failure_counts() {
        let lock = ProcessingLock::new();

        lock.try_acquire("contact-1");
        lock.try_acquire("contact-2");
        lock.release_failure("contact-2");
        lock.try_acquire("contact-2");

        lock.clear_in_flight();

        assert!(!lock.is_locked("contact-1"));
        assert!(!lock.is_locked("contact-2"));
        assert_eq!(lock.failed_attempts("contact-2"), 1);
    }
}
