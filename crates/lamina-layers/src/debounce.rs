//! Edit coalescing for incremental reslicing.
//!
//! Driven by explicit `Instant`s rather than a timer thread, so the
//! single-threaded interpreter (and the tests) control time. Policy is
//! queue-depth-1: any number of triggers inside the quiet window
//! collapse into one fire, and triggers landing after a fire simply
//! re-arm the window for one follow-up.

use std::time::{Duration, Instant};

/// Default quiet period between the last edit and the reslice.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Coalesces rapid trigger events into a single deferred fire.
#[derive(Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

impl Debounce {
    /// Debounce with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Record an edit: restart the quiet window from `now`.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Consume the fire if the quiet window has elapsed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop any pending fire.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Is a fire pending?
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_coalesces_to_one_fire() {
        let mut debounce = Debounce::new(Duration::from_millis(100));
        let t0 = Instant::now();
        debounce.trigger(t0);
        debounce.trigger(t0 + Duration::from_millis(30));
        debounce.trigger(t0 + Duration::from_millis(60));

        // Window restarts from the last trigger.
        assert!(!debounce.fire_due(t0 + Duration::from_millis(120)));
        assert!(debounce.fire_due(t0 + Duration::from_millis(160)));
        assert!(!debounce.fire_due(t0 + Duration::from_millis(161)));
    }

    #[test]
    fn retrigger_after_fire_arms_one_followup() {
        let mut debounce = Debounce::new(Duration::from_millis(100));
        let t0 = Instant::now();
        debounce.trigger(t0);
        assert!(debounce.fire_due(t0 + Duration::from_millis(100)));

        // Edit landing "during the reslice": exactly one more fire.
        debounce.trigger(t0 + Duration::from_millis(110));
        debounce.trigger(t0 + Duration::from_millis(120));
        assert!(debounce.fire_due(t0 + Duration::from_millis(220)));
        assert!(!debounce.fire_due(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn cancel_disarms() {
        let mut debounce = Debounce::default();
        let t0 = Instant::now();
        debounce.trigger(t0);
        assert!(debounce.is_armed());
        debounce.cancel();
        assert!(!debounce.fire_due(t0 + DEFAULT_DELAY + Duration::from_secs(1)));
    }
}
