//! Yaw force curve
//!
//! The tail rotor produces lateral (yaw) force as a function of its tilt
//! angle, but the relation is far from linear: tilting the thrust vector
//! away from vertical also sheds lift, which the motor has to make up, which
//! in turn changes the lateral force again. The curve precomputes the net
//! yaw force per angle so commanded torque can be mapped back to an angle
//! with a table inversion instead of solving the trigonometry per tick.
//!
//! Model, for thrust factor `k` and tail angle `θ` (90° = vertical thrust):
//!
//! ```text
//! force(θ)            = (-k·cos θ - sin θ) · pitch_correction(θ, k)
//! pitch_correction(θ) = 1 / (sin θ - cos θ / k)
//! ```
//!
//! `pitch_correction` is the thrust-magnitude adjustment that keeps the
//! vertical component constant while the rotor tilts. The curve is monotonic
//! non-decreasing over the usable range for any `k > 1`.

use libm::{atanf, cosf, sinf, sqrtf};

/// Neutral tail servo angle (decidegrees); thrust points straight down
pub const TAIL_SERVO_ANGLE_MID: i16 = 900;

/// Hard mechanical curve span either side of neutral (decidegrees)
pub const CURVE_HALF_SPAN: i16 = 500;

/// Number of force samples; one per 10 decidegrees across the span
pub const YAW_FORCE_CURVE_SIZE: usize = 100;

/// Angle step between adjacent samples (decidegrees)
pub const CURVE_STEP: i16 = 10;

/// Fixed-point scale of the force samples
pub const YAW_FORCE_PRECISION: i32 = 1000;

/// Convert decidegrees to radians
pub fn decidegrees_to_radians(decideg: f32) -> f32 {
    (decideg / 10.0).to_radians()
}

/// Thrust-magnitude adjustment for a tail rotor tilted to `angle_rad`.
///
/// Precondition: the angle is inside the curve span, where the denominator
/// is strictly positive for k > 1.
pub fn pitch_correction(angle_rad: f32, thrust_factor: f32) -> f32 {
    1.0 / (sinf(angle_rad) - cosf(angle_rad) / thrust_factor)
}

/// Precomputed yaw force table
///
/// Built once from the configured thrust factor and max deflection;
/// rebuilt only when a calibration rewrites the configuration.
pub struct YawForceCurve {
    samples: [i32; YAW_FORCE_CURVE_SIZE],
    thrust_factor: f32,
    max_yaw_force: i32,
    pitch_zero_angle: f32,
}

impl YawForceCurve {
    /// Build the curve for `thrust_factor` with usable-force tracking
    /// restricted to neutral ± `max_angle` decidegrees.
    pub fn new(thrust_factor: f32, max_angle: i16) -> Self {
        let min_usable = TAIL_SERVO_ANGLE_MID - max_angle;
        let max_usable = TAIL_SERVO_ANGLE_MID + max_angle;

        let mut samples = [0i32; YAW_FORCE_CURVE_SIZE];
        let mut max_neg_force: i32 = 0;
        let mut max_pos_force: i32 = 0;

        let mut angle = TAIL_SERVO_ANGLE_MID - CURVE_HALF_SPAN;
        for sample in samples.iter_mut() {
            let rad = decidegrees_to_radians(angle as f32);
            let force = YAW_FORCE_PRECISION as f32
                * (-thrust_factor * cosf(rad) - sinf(rad))
                * pitch_correction(rad, thrust_factor);
            *sample = force as i32;

            // Only the configured angle range contributes to the usable bound
            if (min_usable..=max_usable).contains(&angle) {
                max_neg_force = max_neg_force.min(*sample);
                max_pos_force = max_pos_force.max(*sample);
            }
            angle += CURVE_STEP;
        }

        // Root of d/dθ[pitch_correction] = 0, i.e. tan θ = -k, via the
        // half-angle form; the angle where motor speed stops falling and
        // starts rising as the servo sweeps.
        let k = thrust_factor;
        let pitch_zero_angle = 10.0 * (2.0 * atanf((sqrtf(k * k + 1.0) + 1.0) / k)).to_degrees();

        Self {
            samples,
            thrust_factor,
            max_yaw_force: max_neg_force.abs().min(max_pos_force.abs()),
            pitch_zero_angle,
        }
    }

    /// Symmetric usable force bound within the configured angle range
    pub fn max_yaw_force(&self) -> i32 {
        self.max_yaw_force
    }

    /// Angle of zero pitching moment (decidegrees)
    pub fn pitch_zero_angle(&self) -> f32 {
        self.pitch_zero_angle
    }

    /// Net yaw force at `angle` decidegrees, closed form
    pub fn force_at_angle(&self, angle: f32) -> i32 {
        let rad = decidegrees_to_radians(angle);
        let force = YAW_FORCE_PRECISION as f32
            * (-self.thrust_factor * cosf(rad) - sinf(rad))
            * pitch_correction(rad, self.thrust_factor);
        force as i32
    }

    /// Invert the curve: the angle (decidegrees) producing `force`.
    ///
    /// Forces outside the table clamp to the extreme angles; in between, a
    /// binary search finds the bracketing samples and interpolates linearly.
    pub fn angle_at_force(&self, force: i32) -> f32 {
        let first = TAIL_SERVO_ANGLE_MID - CURVE_HALF_SPAN;

        if force < self.samples[0] {
            // No force that low
            return first as f32;
        }
        if force >= self.samples[YAW_FORCE_CURVE_SIZE - 1] {
            // No force that high
            return (TAIL_SERVO_ANGLE_MID + CURVE_HALF_SPAN) as f32;
        }

        // samples[lower] <= force < samples[higher]
        let mut lower = 0usize;
        let mut higher = YAW_FORCE_CURVE_SIZE - 1;
        while higher > lower + 1 {
            let mid = (lower + higher) / 2;
            if self.samples[mid] > force {
                higher = mid;
            } else {
                lower = mid;
            }
        }

        let below = self.samples[lower];
        let above = self.samples[higher];
        first as f32
            + (lower as i16 * CURVE_STEP) as f32
            + (force - below) as f32 * CURVE_STEP as f32 / (above - below) as f32
    }
}
