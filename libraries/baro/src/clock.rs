//! Clock sources for the frontend

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

pub use hal::Clock;

/// Wall-clock monotonic time, counted from construction
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Start counting from now
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for MonotonicClock {
    fn millis(&self) -> u32 {
        // wraps like a hardware millisecond counter
        self.origin.elapsed().as_millis() as u32
    }
}

/// Manually driven clock for simulation, log replay and tests.
///
/// Clones share the same time, so the owner of one clone can advance the
/// time seen by a frontend holding another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU32>,
}

impl ManualClock {
    /// Clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute time
    pub fn set(&self, now_ms: u32) {
        self.now_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Move time forward
    pub fn advance(&self, delta_ms: u32) {
        // fetch_add wraps on overflow
        self.now_ms.fetch_add(delta_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u32 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new();
        let view = clock.clone();
        clock.set(100);
        clock.advance(25);
        assert_eq!(view.millis(), 125);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.millis();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.millis() >= first + 1);
    }

    #[test]
    fn test_manual_clock_shared_across_threads() {
        let clock = ManualClock::new();
        let writer = clock.clone();
        std::thread::spawn(move || writer.advance(250))
            .join()
            .unwrap();
        assert_eq!(clock.millis(), 250);
    }

    #[test]
    fn test_manual_clock_wraps() {
        let clock = ManualClock::new();
        clock.set(u32::MAX);
        clock.advance(2);
        assert_eq!(clock.millis(), 1);
    }
}
