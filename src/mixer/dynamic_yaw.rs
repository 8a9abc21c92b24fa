//! Dynamic yaw scaler
//!
//! Tail servo yaw authority grows with tail motor thrust, so a fixed PID
//! output over-controls at full throttle and under-controls near idle. The
//! scaler rescales commanded yaw by the distance of the estimated motor
//! output from the hover reference, with independent gains below and above
//! hover. A hover reference of zero disables the feature.
//!
//! The ranges are recomputed from the stored output bounds on every call, so
//! a hover-throttle update from thrust-torque calibration takes effect on
//! the next tick. The bounds themselves only change through
//! [`DynamicYaw::set_output_limits`].

use crate::config::TailConfig;

/// Motor output bounds the mixer scales against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    /// Lowest commanded motor output (idle)
    pub low: u16,
    /// Highest commanded motor output
    pub high: u16,
}

impl OutputLimits {
    /// Full output span; zero when the bounds are inverted
    pub fn range(&self) -> i16 {
        self.high.saturating_sub(self.low) as i16
    }
}

/// Throttle-dependent yaw rescaler
#[derive(Debug, Clone, Copy)]
pub struct DynamicYaw {
    limits: OutputLimits,
}

impl DynamicYaw {
    pub fn new(limits: OutputLimits) -> Self {
        Self { limits }
    }

    /// Replace the output bounds (motor output limits changed)
    pub fn set_output_limits(&mut self, limits: OutputLimits) {
        self.limits = limits;
    }

    /// Rescale `yaw` (±1000) by the distance of `motor_output` from hover
    pub fn scale(&self, config: &TailConfig, yaw: i16, motor_output: f32) -> i16 {
        let hover = config.dynamic_yaw_hoverthrottle as i32;
        if hover == 0 {
            return yaw;
        }

        let range = (self.limits.high as i32) - (self.limits.low as i32);
        let low_range = hover - self.limits.low as i32;
        let high_range = range - low_range;
        if low_range == 0 || high_range == 0 {
            return yaw;
        }

        let below_hover = (motor_output as i32) < hover;
        // Percent deviation from unity gain at the respective extreme
        let gain = if below_hover {
            config.dynamic_yaw_minthrottle as i32 - 100
        } else {
            100 - config.dynamic_yaw_maxthrottle as i32
        };

        let distance_from_hover = motor_output as i32 - hover;
        let side_range = if below_hover { low_range } else { high_range };

        let scaled = yaw as i32 - distance_from_hover * gain * yaw as i32 / (side_range * 100);

        scaled.clamp(-1000, 1000) as i16
    }
}
