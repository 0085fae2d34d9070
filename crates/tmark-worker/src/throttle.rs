//! Per-video progress throttling.

use std::time::{Duration, Instant};

/// Rate limiter for one video's progress events.
///
/// Stage transitions and terminal events always pass and reset the window;
/// intermediate ticks pass at most once per interval.
#[derive(Debug)]
pub struct ProgressThrottle {
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
        }
    }

    /// Whether an event may be emitted now.
    pub fn allow(&mut self, always: bool) -> bool {
        self.allow_at(Instant::now(), always)
    }

    fn allow_at(&mut self, now: Instant, always: bool) -> bool {
        if always {
            self.last_emit = Some(now);
            return true;
        }
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_passes() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(250));
        assert!(throttle.allow(false));
    }

    #[test]
    fn ticks_inside_the_window_are_dropped() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(250));
        let start = Instant::now();
        assert!(throttle.allow_at(start, false));
        assert!(!throttle.allow_at(start + Duration::from_millis(100), false));
        assert!(!throttle.allow_at(start + Duration::from_millis(249), false));
        assert!(throttle.allow_at(start + Duration::from_millis(250), false));
    }

    #[test]
    fn transitions_always_pass_and_reset_the_window() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(250));
        let start = Instant::now();
        assert!(throttle.allow_at(start, false));
        assert!(throttle.allow_at(start + Duration::from_millis(10), true));
        // The transition reset the window; the next tick must wait again.
        assert!(!throttle.allow_at(start + Duration::from_millis(100), false));
    }
}
