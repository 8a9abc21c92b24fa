//! Mock clock with manually advanced time

use core::cell::Cell;

use crate::platform::traits::ClockInterface;

/// Mock clock implementation
///
/// Time only moves when the test advances it, so timeout logic can be
/// exercised without real delays. Interior mutability lets the clock be
/// advanced while the code under test holds a shared reference.
#[derive(Debug, Default)]
pub struct MockClock {
    now_us: Cell<u64>,
}

impl MockClock {
    /// Create a new mock clock at t = 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance simulated time by `us` microseconds
    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get().wrapping_add(us));
    }

    /// Advance simulated time by `ms` milliseconds
    pub fn advance_ms(&self, ms: u32) {
        self.advance_us(ms as u64 * 1000);
    }
}

impl ClockInterface for MockClock {
    fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}
