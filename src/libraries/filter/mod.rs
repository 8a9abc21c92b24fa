//! Filter primitives
//!
//! First-order low-pass and slew-rate limiting, the two shapes of smoothing
//! the tail mixer needs: the low-pass models sensor/motor response lag, the
//! slew limiter models actuators that move at a bounded rate.

use core::f32::consts::PI;

/// First-order (PT1) low-pass filter
///
/// The cutoff frequency is passed per call so one state variable can serve
/// callers with different loop rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pt1Filter {
    state: f32,
}

impl Pt1Filter {
    /// Create a filter settled at zero
    pub const fn new() -> Self {
        Self { state: 0.0 }
    }

    /// Create a filter settled at `value`
    pub const fn settled_at(value: f32) -> Self {
        Self { state: value }
    }

    /// Advance the filter by one sample
    pub fn apply(&mut self, input: f32, cutoff_hz: f32, dt: f32) -> f32 {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        let k = dt / (rc + dt);
        self.state += k * (input - self.state);
        self.state
    }

    /// Current filter output
    pub fn value(&self) -> f32 {
        self.state
    }

    /// Force the filter state to `value`
    pub fn reset(&mut self, value: f32) {
        self.state = value;
    }
}

/// Move `current` toward `target` by at most `max_delta`.
///
/// Snaps to the target once within one step, so the output converges in
/// ceil(|target - current| / max_delta) calls and never overshoots.
pub fn slew_limit(current: f32, target: f32, max_delta: f32) -> f32 {
    let diff = target - current;
    if diff.abs() < max_delta {
        target
    } else if diff > 0.0 {
        current + max_delta
    } else {
        current - max_delta
    }
}
