//! Pacing between upstream requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::debug;

/// Called by the sync engine between consecutive fetch windows.
pub trait Throttle: Send + Sync {
    fn pause(&self);
}

/// Blocking fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::from_millis(500)
    }
}

impl Throttle for FixedDelay {
    fn pause(&self) {
        debug!(delay_ms = self.delay.as_millis() as u64, "throttling before next window");
        std::thread::sleep(self.delay);
    }
}

/// No delay; counts pauses so tests can assert on pacing.
#[derive(Debug, Default)]
pub struct NoDelay {
    pauses: AtomicUsize,
}

impl NoDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::Relaxed)
    }
}

impl Throttle for NoDelay {
    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn fixed_delay_sleeps() {
        let throttle = FixedDelay::from_millis(5);
        let start = Instant::now();
        throttle.pause();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn default_is_half_second() {
        assert_eq!(FixedDelay::default().delay(), Duration::from_millis(500));
    }

    #[test]
    fn no_delay_counts() {
        let throttle = NoDelay::new();
        throttle.pause();
        throttle.pause();
        assert_eq!(throttle.pauses(), 2);
    }
}
