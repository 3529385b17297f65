use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window request budget: at most `capacity` requests in any
/// `window`-long interval.
#[derive(Debug, Clone)]
pub struct RateWindow {
    capacity: usize,
    window: Duration,
    stamps: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            stamps: VecDeque::new(),
        }
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests as usize, Duration::from_secs(60))
    }

    /// Books one request at `now` and returns how long the caller must wait
    /// before sending it.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }

        let at = if self.stamps.len() >= self.capacity {
            match self.stamps.pop_front() {
                Some(oldest) => oldest + self.window,
                None => now,
            }
        } else {
            now
        };
        self.stamps.push_back(at);
        at.saturating_duration_since(now)
    }

    pub fn in_flight(&self) -> usize {
        self.stamps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::RateWindow;
    use std::time::{Duration, Instant};

    #[test]
    fn waits_once_the_window_is_full() {
        let t0 = Instant::now();
        let mut w = RateWindow::new(2, Duration::from_secs(60));
        assert_eq!(Duration::ZERO, w.reserve(t0));
        assert_eq!(Duration::ZERO, w.reserve(t0 + Duration::from_secs(10)));
        assert_eq!(Duration::from_secs(50), w.reserve(t0 + Duration::from_secs(10)));
        assert_eq!(2, w.in_flight());
    }

    #[test]
    fn expired_requests_free_their_slot() {
        let t0 = Instant::now();
        let mut w = RateWindow::new(1, Duration::from_secs(60));
        assert_eq!(Duration::ZERO, w.reserve(t0));
        assert_eq!(Duration::ZERO, w.reserve(t0 + Duration::from_secs(61)));
        assert_eq!(1, w.in_flight());
    }

    #[test]
    fn queued_requests_stack_up() {
        let t0 = Instant::now();
        let mut w = RateWindow::new(1, Duration::from_secs(60));
        w.reserve(t0);
        assert_eq!(Duration::from_secs(60), w.reserve(t0));
        assert_eq!(Duration::from_secs(120), w.reserve(t0));
    }
}
