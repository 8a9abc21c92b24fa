//! Virtual actuator simulator
//!
//! The tail servo position is either measured (feedback ADC routed through a
//! low-pass filter and the anchor map) or simulated by rate-limiting the
//! commanded angle with the configured servo speed. The tail motor response
//! is always simulated: a slew toward the commanded throttle at the
//! configured acceleration, smoothed by a low-pass filter to stand in for
//! spool-up lag.

use crate::libraries::filter::{slew_limit, Pt1Filter};

/// Feedback ADC low-pass cutoff (Hz)
pub const FEEDBACK_LPF_CUTOFF_HZ: f32 = 70.0;

/// Virtual motor low-pass cutoff (Hz); roughly a 14 ms response delay
pub const MOTOR_LPF_CUTOFF_HZ: f32 = 5.0;

/// Advance a simulated servo by one tick.
///
/// Moves `current_angle` (decidegrees) toward `target_angle` by at most
/// `dt * speed_deg_s * 10` decidegrees, converging without overshoot.
pub fn virtual_servo_step(current_angle: f32, speed_deg_s: i16, dt: f32, target_angle: f32) -> f32 {
    let max_delta = dt * speed_deg_s as f32 * 10.0;
    slew_limit(current_angle, target_angle, max_delta)
}

/// Simulated tail motor output
///
/// Tracks the commanded throttle with bounded acceleration and first-order
/// lag; the smoothed output estimates the thrust the motor actually
/// produces right now.
#[derive(Debug)]
pub struct VirtualMotor {
    current: f32,
    filter: Pt1Filter,
    /// Output units per second
    acceleration: f32,
}

impl VirtualMotor {
    /// `throttle_range` is the full output span (high - low);
    /// `acceleration_ds` the configured full-sweep time in deciseconds.
    pub fn new(throttle_range: i16, acceleration_ds: u16, initial_output: f32) -> Self {
        Self {
            current: initial_output,
            filter: Pt1Filter::settled_at(initial_output),
            acceleration: throttle_range as f32 / (acceleration_ds as f32 * 0.1),
        }
    }

    /// Update the acceleration bound without disturbing the motor state
    pub fn set_acceleration(&mut self, throttle_range: i16, acceleration_ds: u16) {
        self.acceleration = throttle_range as f32 / (acceleration_ds as f32 * 0.1);
    }

    /// Advance the model by one tick toward `setpoint` output units
    pub fn step(&mut self, setpoint: f32, dt: f32) -> f32 {
        self.current = slew_limit(self.current, setpoint, dt * self.acceleration);
        self.filter.apply(self.current, MOTOR_LPF_CUTOFF_HZ, dt)
    }

    /// Current estimated motor output
    pub fn output(&self) -> f32 {
        self.filter.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_servo_converges_in_expected_ticks() {
        // 300 deg/s at 1 kHz moves 3 decideg per tick
        let mut angle = 900.0;
        let target = 960.0;
        let mut ticks = 0;
        while angle != target {
            angle = virtual_servo_step(angle, 300, 0.001, target);
            assert!(angle <= target);
            ticks += 1;
        }
        assert_eq!(ticks, 20);
    }

    #[test]
    fn test_virtual_servo_never_overshoots() {
        let mut angle = 1300.0;
        for _ in 0..100 {
            angle = virtual_servo_step(angle, 300, 0.01, 500.0);
            assert!(angle >= 500.0);
        }
        assert_eq!(angle, 500.0);
    }

    #[test]
    fn test_virtual_servo_holds_at_target() {
        assert_eq!(virtual_servo_step(700.0, 300, 0.001, 700.0), 700.0);
    }

    #[test]
    fn test_virtual_motor_approaches_setpoint() {
        // Full sweep 1000 units in 1.8 s (default acceleration 18 ds)
        let mut motor = VirtualMotor::new(1000, 18, 1000.0);
        let mut prev = motor.output();
        for _ in 0..100 {
            let out = motor.step(2000.0, 0.001);
            assert!(out >= prev);
            assert!(out <= 2000.0);
            prev = out;
        }
        // 100 ms of slew at ~555 units/s plus filter lag
        assert!(motor.output() > 1000.0);
        assert!(motor.output() < 1100.0);
    }

    #[test]
    fn test_virtual_motor_settles() {
        let mut motor = VirtualMotor::new(1000, 18, 1000.0);
        for _ in 0..10_000 {
            motor.step(1600.0, 0.001);
        }
        assert!((motor.output() - 1600.0).abs() < 1.0);
    }
}
