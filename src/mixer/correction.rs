//! Feed-forward tail motor correction
//!
//! A tilted tail rotor sheds vertical thrust; the tail motor has to run
//! faster to keep the pitching moment at zero. The correction anticipates
//! where the servo will be once the motor has had time to respond: the
//! angle difference between the current and setpoint angle is clamped to a
//! phase-shift allowance, and the pitch correction is evaluated at that
//! projected angle.
//!
//! The allowance depends on whether the motor is speeding up or slowing
//! down. Speed changes toward the zero-pitch-moment angle mean braking,
//! which is slower than accelerating, so braking gets the larger window
//! (bounded by how far the servo still is from the zero-moment angle).

use crate::config::TailConfig;

use super::curve::{decidegrees_to_radians, pitch_correction, TAIL_SERVO_ANGLE_MID};

/// Servo travel the motor can follow while spooling up (ms)
pub const MOTOR_ACCELERATION_DELAY_MS: f32 = 30.0;

/// Servo travel the motor can follow while braking (ms)
pub const MOTOR_DECELERATION_DELAY_MS: f32 = 100.0;

/// Feed-forward correction model, rebuilt whenever the configuration changes
#[derive(Debug, Clone, Copy)]
pub struct CorrectionModel {
    thrust_factor: f32,
    max_angle: i16,
    /// Phase shift allowance while the motor accelerates (decidegrees)
    acceleration_delay_angle: f32,
    /// Phase shift allowance while the motor brakes (decidegrees)
    deceleration_delay_angle: f32,
    /// Angle of zero pitching moment (decidegrees)
    pitch_zero_angle: f32,
    /// Full throttle output span (high - low)
    throttle_range: i16,
}

impl CorrectionModel {
    pub fn new(config: &TailConfig, pitch_zero_angle: f32, throttle_range: i16) -> Self {
        let speed = config.tail_servo_speed as f32;
        Self {
            thrust_factor: config.thrust_factor(),
            max_angle: config.servo_angle_at_max,
            acceleration_delay_angle: 10.0 * (MOTOR_ACCELERATION_DELAY_MS / 1000.0) * speed,
            deceleration_delay_angle: 10.0 * (MOTOR_DECELERATION_DELAY_MS / 1000.0) * speed,
            pitch_zero_angle,
            throttle_range,
        }
    }

    /// Additive throttle correction for the tail motor.
    ///
    /// `servo_angle` and `setpoint_angle` in decidegrees; `motor_output` is
    /// the estimated current motor output and `idle_throttle` the low output
    /// bound.
    pub fn correction(
        &self,
        servo_angle: f32,
        setpoint_angle: f32,
        motor_output: f32,
        idle_throttle: i16,
    ) -> i16 {
        let max_phase_shift = self.max_phase_shift(servo_angle, setpoint_angle);

        let mut angle_diff = setpoint_angle - servo_angle;
        if angle_diff.abs() > max_phase_shift {
            angle_diff = max_phase_shift.copysign(angle_diff);
        }

        let future_angle = (servo_angle + angle_diff).clamp(
            (TAIL_SERVO_ANGLE_MID - self.max_angle) as f32,
            (TAIL_SERVO_ANGLE_MID + self.max_angle) as f32,
        );

        // Pitch correction needs a thrust to scale; near idle the real
        // thrust is about zero, so floor the output at half range to keep
        // some yaw authority (slightly over-corrects forward pitch there).
        let throttle_output =
            (motor_output - idle_throttle as f32).clamp(self.throttle_range as f32 / 2.0, 1000.0);

        let corrected = throttle_output
            * pitch_correction(decidegrees_to_radians(future_angle), self.thrust_factor);

        (corrected - throttle_output) as i16
    }

    /// Largest angle difference the motor can be assumed to have followed
    fn max_phase_shift(&self, servo_angle: f32, setpoint_angle: f32) -> f32 {
        let braking = (servo_angle > setpoint_angle
            && servo_angle >= self.pitch_zero_angle + self.acceleration_delay_angle)
            || (servo_angle < setpoint_angle
                && servo_angle <= self.pitch_zero_angle - self.acceleration_delay_angle);

        if braking {
            // Braking can be anticipated up to the zero-moment crossing
            (servo_angle - self.pitch_zero_angle)
                .abs()
                .min(self.deceleration_delay_angle)
        } else {
            self.acceleration_delay_angle
        }
    }
}
