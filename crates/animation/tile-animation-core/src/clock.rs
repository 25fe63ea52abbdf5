//! Time sources for transitions and the animation driver.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic milliseconds. Only differences between readings matter.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by [`Instant`]. Not available on `wasm32-unknown-unknown`;
/// hosts there drive a [`ManualClock`] from their frame callback instead.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock whose time is set explicitly. Clones share the same reading, so
/// the host keeps one handle and passes another to the animation.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    #[inline]
    pub fn set(&self, now_ms: f64) {
        self.now.set(now_ms);
    }

    #[inline]
    pub fn advance(&self, delta_ms: f64) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(10.0);
        let other = clock.clone();
        clock.advance(5.0);
        assert_eq!(other.now_ms(), 15.0);
        other.set(100.0);
        assert_eq!(clock.now_ms(), 100.0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
