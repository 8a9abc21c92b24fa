//! Monotonic clock interface
//!
//! All tail tune timeouts are deadline comparisons against timestamps taken
//! from this clock. Implementations must be monotonic; wrap-around of the
//! millisecond counter is handled by the callers with wrapping subtraction.

/// Monotonic clock interface
pub trait ClockInterface {
    /// Microseconds since an arbitrary epoch (boot)
    fn now_us(&self) -> u64;

    /// Milliseconds since an arbitrary epoch, truncated to u32
    ///
    /// Wraps after ~49.7 days; compare with `wrapping_sub`.
    fn now_ms(&self) -> u32 {
        (self.now_us() / 1000) as u32
    }
}
