//! Debounced reconciliation trigger
//!
//! Coalesces bursts of file-change notifications into single reconciliation
//! invocations. This is the core defense against recompute storms during
//! bulk file operations (a version-control checkout touching hundreds of
//! templates must cost one cycle, not hundreds).
//!
//! The trigger is an explicit timer-state struct driven by the engine's
//! scheduler tick; every method takes `now` so tests exercise the timing
//! contract without sleeping.
//!
//! Guarantees:
//! - repeated changes inside the quiet period reset the timer instead of
//!   queuing multiple runs
//! - at most one reconciliation is scheduled at a time
//! - a change arriving while a cycle executes schedules exactly one
//!   follow-up cycle, never more

use std::time::{Duration, Instant};

/// Default quiet period between the last file change and the cycle it
/// triggers.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct DebouncedTrigger {
    quiet_period: Duration,
    /// When the pending cycle fires, if one is pending
    deadline: Option<Instant>,
    /// A cycle is currently executing
    running: bool,
    /// A change arrived mid-cycle; schedule one follow-up on finish
    rerun_requested: bool,
}

impl DebouncedTrigger {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            deadline: None,
            running: false,
            rerun_requested: false,
        }
    }

    /// Record a file-change notification at `now`.
    ///
    /// Resets the pending deadline; during an executing cycle it instead
    /// requests a single follow-up.
    pub fn note_change(&mut self, now: Instant) {
        if self.running {
            self.rerun_requested = true;
        } else {
            self.deadline = Some(now + self.quiet_period);
        }
    }

    /// Scheduler tick: returns true when a cycle should start now.
    ///
    /// On true the trigger transitions to running; the caller must invoke
    /// [`Self::finish`] when the cycle completes.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.running {
            return false;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.running = true;
                true
            }
            _ => false,
        }
    }

    /// Mark the executing cycle complete. If a change arrived mid-cycle,
    /// one follow-up cycle is scheduled after a fresh quiet period.
    pub fn finish(&mut self, now: Instant) {
        self.running = false;
        if std::mem::take(&mut self.rerun_requested) {
            self.deadline = Some(now + self.quiet_period);
        }
    }

    /// A cycle is scheduled or executing.
    pub fn pending(&self) -> bool {
        self.running || self.deadline.is_some()
    }
}

impl Default for DebouncedTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(100);

    fn trigger() -> DebouncedTrigger {
        DebouncedTrigger::new(QUIET)
    }

    #[test]
    fn test_no_change_never_fires() {
        let mut t = trigger();
        let now = Instant::now();
        assert!(!t.poll(now));
        assert!(!t.poll(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_fires_after_quiet_period() {
        let mut t = trigger();
        let now = Instant::now();
        t.note_change(now);
        assert!(!t.poll(now + Duration::from_millis(50)));
        assert!(t.poll(now + QUIET));
    }

    #[test]
    fn test_burst_coalesces_to_one_cycle() {
        let mut t = trigger();
        let now = Instant::now();
        // 10 changes, 10ms apart, all inside the quiet window
        for i in 0..10 {
            t.note_change(now + Duration::from_millis(i * 10));
        }
        let last = now + Duration::from_millis(90);
        // Quiet period counts from the last change
        assert!(!t.poll(last + Duration::from_millis(50)));
        assert!(t.poll(last + QUIET));
        t.finish(last + QUIET);
        // Exactly one cycle: nothing further pending
        assert!(!t.pending());
        assert!(!t.poll(last + Duration::from_secs(10)));
    }

    #[test]
    fn test_spaced_changes_fire_individually() {
        let mut t = trigger();
        let mut now = Instant::now();
        let mut fired = 0;
        for _ in 0..3 {
            t.note_change(now);
            now += QUIET;
            if t.poll(now) {
                fired += 1;
                t.finish(now);
            }
            now += Duration::from_secs(1);
        }
        assert_eq!(fired, 3);
    }

    #[test]
    fn test_change_during_cycle_schedules_one_followup() {
        let mut t = trigger();
        let now = Instant::now();
        t.note_change(now);
        assert!(t.poll(now + QUIET));

        // Three changes land while the cycle is executing
        for i in 0..3 {
            t.note_change(now + QUIET + Duration::from_millis(i));
        }
        // Still running: nothing fires
        assert!(!t.poll(now + QUIET + Duration::from_millis(5)));

        let done = now + QUIET + Duration::from_millis(10);
        t.finish(done);
        assert!(t.pending());
        // Exactly one follow-up, after a fresh quiet period
        assert!(!t.poll(done));
        assert!(t.poll(done + QUIET));
        t.finish(done + QUIET);
        assert!(!t.pending());
    }

    #[test]
    fn test_at_most_one_scheduled() {
        let mut t = trigger();
        let now = Instant::now();
        t.note_change(now);
        t.note_change(now + Duration::from_millis(1));
        assert!(t.poll(now + Duration::from_millis(1) + QUIET));
        t.finish(now + Duration::from_millis(200));
        // Both changes were coalesced into the cycle that just ran
        assert!(!t.pending());
    }
}
