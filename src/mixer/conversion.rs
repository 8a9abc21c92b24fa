//! Angle/value conversion
//!
//! Bidirectional piecewise-linear mapping between a servo value and the
//! mechanical tail angle, through three anchors:
//!
//! ```text
//! min value  <->  neutral - max_angle
//! mid value  <->  neutral
//! max value  <->  neutral + max_angle
//! ```
//!
//! The same mapping serves two value domains: output pulse values (from the
//! servo endpoints) and raw feedback ADC values (from the calibration
//! anchors). A reversed servo direction mirrors the mapping. Both directions
//! are exact inverses at the three anchors.
//!
//! Precondition: the anchors are pairwise distinct. This is not checked in
//! the per-tick path; the calibration flow refuses to persist anchors closer
//! than [`MIN_ANCHOR_SEPARATION`](crate::config::MIN_ANCHOR_SEPARATION).

use crate::config::{ServoDirection, ServoParams, TailConfig};

use super::curve::TAIL_SERVO_ANGLE_MID;

/// Three-anchor piecewise-linear angle map
#[derive(Debug, Clone, Copy)]
pub struct AnchorMap {
    min: i32,
    mid: i32,
    max: i32,
    max_angle: i32,
    direction: ServoDirection,
}

impl AnchorMap {
    /// Map over the servo output endpoints (pulse values)
    pub fn from_servo(servo: &ServoParams, direction: ServoDirection, max_angle: i16) -> Self {
        Self {
            min: servo.min as i32,
            mid: servo.mid as i32,
            max: servo.max as i32,
            max_angle: max_angle as i32,
            direction,
        }
    }

    /// Map over the feedback ADC calibration anchors
    pub fn from_feedback(config: &TailConfig) -> Self {
        Self {
            min: config.servo_min_adc as i32,
            mid: config.servo_mid_adc as i32,
            max: config.servo_max_adc as i32,
            max_angle: config.servo_angle_at_max as i32,
            direction: config.servo_direction,
        }
    }

    /// Servo value producing `angle` decidegrees
    pub fn value_at_angle(&self, angle: f32) -> u16 {
        let angle_offset = angle - TAIL_SERVO_ANGLE_MID as f32;

        // Reversed direction swaps which endpoint each half-range runs to
        let (low_end, high_end) = match self.direction {
            ServoDirection::Normal => (self.min, self.max),
            ServoDirection::Reversed => (self.max, self.min),
        };

        let value = if angle_offset < 0.0 {
            self.mid as f32 + angle_offset * (self.mid - low_end) as f32 / self.max_angle as f32
        } else if angle_offset > 0.0 {
            self.mid as f32 + angle_offset * (high_end - self.mid) as f32 / self.max_angle as f32
        } else {
            self.mid as f32
        };

        value as u16
    }

    /// Angle (decidegrees) at servo `value`
    pub fn angle_at_value(&self, value: i32) -> f32 {
        let (end_value, end_angle) = if value < self.mid {
            (self.min, -self.max_angle)
        } else {
            (self.max, self.max_angle)
        };

        let offset =
            end_angle as f32 * (value - self.mid) as f32 / (end_value - self.mid) as f32;

        match self.direction {
            ServoDirection::Normal => TAIL_SERVO_ANGLE_MID as f32 + offset,
            ServoDirection::Reversed => TAIL_SERVO_ANGLE_MID as f32 - offset,
        }
    }
}
