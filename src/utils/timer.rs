//! Single-shot deadline timer
//!
//! Timers are plain deadlines owned by whoever schedules them. The control
//! loop sleeps until the earliest armed deadline and then asks each owner to
//! fire what is due, so no callback ever runs outside the loop.

use std::time::Duration;
use tokio::time::Instant;

/// A one-shot timer that is either idle or armed for a deadline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleShot {
    deadline: Option<Instant>,
}

impl SingleShot {
    /// Create an idle timer
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm (or re-arm) the timer to fire `delay` after `now`
    pub fn start(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Disarm the timer
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether the timer is armed
    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// The armed deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire the timer if its deadline has passed
    ///
    /// Returns true exactly once per arming.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of a set of optional deadlines
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_timer_never_fires() {
        let mut timer = SingleShot::new();
        assert!(!timer.is_active());
        assert!(!timer.fire(Instant::now() + Duration::from_secs(3600)));
    }

    #[test]
    fn test_fires_once_after_deadline() {
        let now = Instant::now();
        let mut timer = SingleShot::new();
        timer.start(now, Duration::from_millis(1200));

        assert!(!timer.fire(now + Duration::from_millis(1199)));
        assert!(timer.is_active());
        assert!(timer.fire(now + Duration::from_millis(1200)));
        assert!(!timer.is_active());
        assert!(!timer.fire(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let now = Instant::now();
        let mut timer = SingleShot::new();
        timer.start(now, Duration::from_secs(1));
        timer.cancel();
        assert!(!timer.fire(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_restart_moves_deadline() {
        let now = Instant::now();
        let mut timer = SingleShot::new();
        timer.start(now, Duration::from_secs(1));
        timer.start(now, Duration::from_secs(5));
        assert_eq!(timer.deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_earliest() {
        let now = Instant::now();
        let later = now + Duration::from_secs(2);
        assert_eq!(earliest([None, Some(later), Some(now)]), Some(now));
        assert_eq!(earliest([None, None]), None);
    }
}
