//! Tick clocks for schedulers

use applet_core::Clock;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Wall-clock ticks: milliseconds since the clock was created
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        // Wraps after ~49 days; tick consumers only compare differences
        self.start.elapsed().as_millis() as u32
    }
}

/// Hand-driven clock; clones share the same tick
///
/// Lets a test or a simulation move time forward explicitly.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u32>>,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}
