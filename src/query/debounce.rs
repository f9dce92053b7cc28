use std::time::{Duration, Instant};

/// Single-slot debounce timer.
///
/// Scheduling replaces any pending deadline, so only the latest change
/// fires. Time is passed in by the caller.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once when the deadline has passed.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_delay() {
        let start = Instant::now();
        let mut timer = Debouncer::new(Duration::from_millis(400));
        timer.schedule(start);

        assert!(!timer.fire(start + Duration::from_millis(399)));
        assert!(timer.fire(start + Duration::from_millis(400)));
        assert!(!timer.fire(start + Duration::from_millis(900)));
        assert!(!timer.is_pending());
    }

    #[test]
    fn reschedule_replaces_pending_deadline() {
        let start = Instant::now();
        let mut timer = Debouncer::new(Duration::from_millis(400));
        timer.schedule(start);
        timer.schedule(start + Duration::from_millis(300));

        assert!(!timer.fire(start + Duration::from_millis(500)));
        assert!(timer.fire(start + Duration::from_millis(700)));
    }

    #[test]
    fn cancel_clears_slot() {
        let start = Instant::now();
        let mut timer = Debouncer::new(Duration::from_millis(10));
        timer.schedule(start);
        timer.cancel();
        assert!(timer.deadline().is_none());
        assert!(!timer.fire(start + Duration::from_secs(1)));
    }
}
