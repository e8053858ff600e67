//! Monotonic time source.
//!
//! The dispatch deadline arithmetic reads time through [`Clock`] so tests can
//! move it by hand. Only the hard-deadline check uses this clock; the
//! speculative tick ladder and the periodic flush sleep on the tokio timer,
//! which tests drive separately with `start_paused`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The process monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Intended for tests.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_stands_still() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let before = clock.now();
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - before, Duration::from_millis(250));
    }

    #[test]
    fn test_manual_clock_accumulates() {
        let clock = ManualClock::new();
        let before = clock.now();
        clock.advance(Duration::from_millis(100));
        clock.advance(Duration::from_millis(100));
        assert_eq!(clock.now() - before, Duration::from_millis(200));
    }
}
