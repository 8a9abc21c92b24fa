//! Persisted tail mixer configuration
//!
//! One read-mostly record shared with the rest of the firmware. The mixer
//! itself only writes it at calibration terminal transitions, and every write
//! is followed by a [`ConfigStore::request_save`] on the injected store.
//!
//! [`ConfigStore::request_save`]: crate::platform::traits::ConfigStore::request_save

/// Tail servo feedback signal source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoFeedback {
    /// No physical feedback signal, servo position is simulated
    Virtual,
    /// Feedback wired to the first spare ADC channel
    SensorA,
    /// Feedback wired to the second spare ADC channel
    SensorB,
}

/// Tail servo mounting direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoDirection {
    Normal,
    Reversed,
}

/// Tail servo output endpoints (pulse units)
///
/// Adjusted interactively by the servo setup calibration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoParams {
    pub min: u16,
    pub mid: u16,
    pub max: u16,
}

impl Default for ServoParams {
    fn default() -> Self {
        Self {
            min: 1000,
            mid: 1500,
            max: 2000,
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A field is outside its allowed range
    OutOfRange { field: &'static str },
    /// Feedback calibration anchors are too close together to be usable
    DegenerateAnchors,
}

/// Minimum raw-unit spread between neighbouring feedback anchors.
///
/// Below this the feedback signal is considered disconnected; the servo
/// setup calibration aborts rather than persist unusable anchors.
pub const MIN_ANCHOR_SEPARATION: u16 = 100;

/// Persisted tail mixer configuration record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailConfig {
    /// Below-hover yaw gain (%), 0-500
    pub dynamic_yaw_minthrottle: u16,
    /// Above-hover yaw gain (%), 0-100
    pub dynamic_yaw_maxthrottle: u16,
    /// Hover throttle reference, 0-2000; 0 disables dynamic yaw
    pub dynamic_yaw_hoverthrottle: i16,
    /// Tail motor full-sweep acceleration time (deciseconds), 1-100
    pub motor_acceleration: u16,
    /// Maximum mechanical deflection from neutral (decidegrees), 0-400
    pub servo_angle_at_max: i16,
    /// Servo feedback source
    pub servo_feedback: ServoFeedback,
    /// Servo direction
    pub servo_direction: ServoDirection,
    /// Feedback ADC value at min deflection
    pub servo_min_adc: u16,
    /// Feedback ADC value at neutral
    pub servo_mid_adc: u16,
    /// Feedback ADC value at max deflection
    pub servo_max_adc: u16,
    /// Which motor output drives the tail, 0-2
    pub tail_motor_index: u8,
    /// Tail motor thrust/drag ratio x10, 10-400
    pub tail_motor_thrustfactor: i16,
    /// Tail servo angular speed (deg/s), 0-1000
    pub tail_servo_speed: i16,
    /// Tail servo output endpoints
    pub servo: ServoParams,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            dynamic_yaw_minthrottle: 100,
            dynamic_yaw_maxthrottle: 100,
            dynamic_yaw_hoverthrottle: 0,
            motor_acceleration: 18,
            servo_angle_at_max: 400,
            servo_feedback: ServoFeedback::SensorA,
            servo_direction: ServoDirection::Normal,
            servo_min_adc: 0,
            servo_mid_adc: 0,
            servo_max_adc: 0,
            tail_motor_index: 0,
            tail_motor_thrustfactor: 138,
            tail_servo_speed: 300,
            servo: ServoParams::default(),
        }
    }
}

impl TailConfig {
    /// Thrust factor as a float ratio (configured value is x10)
    pub fn thrust_factor(&self) -> f32 {
        self.tail_motor_thrustfactor as f32 / 10.0
    }

    /// Validate every field against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, field: &'static str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { field })
            }
        }

        check(
            self.dynamic_yaw_minthrottle <= 500,
            "dynamic_yaw_minthrottle",
        )?;
        check(
            self.dynamic_yaw_maxthrottle <= 100,
            "dynamic_yaw_maxthrottle",
        )?;
        check(
            (0..=2000).contains(&self.dynamic_yaw_hoverthrottle),
            "dynamic_yaw_hoverthrottle",
        )?;
        check(
            (1..=100).contains(&self.motor_acceleration),
            "motor_acceleration",
        )?;
        check(
            (0..=400).contains(&self.servo_angle_at_max),
            "servo_angle_at_max",
        )?;
        check(self.tail_motor_index <= 2, "tail_motor_index")?;
        check(
            (10..=400).contains(&self.tail_motor_thrustfactor),
            "tail_motor_thrustfactor",
        )?;
        check(
            (0..=1000).contains(&self.tail_servo_speed),
            "tail_servo_speed",
        )?;
        check(self.servo.min < self.servo.mid, "servo.min")?;
        check(self.servo.mid < self.servo.max, "servo.max")?;
        Ok(())
    }

    /// Check that the feedback calibration anchors are usable.
    ///
    /// The piecewise-linear feedback conversion divides by anchor
    /// differences; anchors closer than [`MIN_ANCHOR_SEPARATION`] mean the
    /// feedback signal is missing or disconnected.
    pub fn validate_feedback_anchors(&self) -> Result<(), ConfigError> {
        let min_mid = self.servo_min_adc.abs_diff(self.servo_mid_adc);
        let mid_max = self.servo_mid_adc.abs_diff(self.servo_max_adc);
        if min_mid < MIN_ANCHOR_SEPARATION || mid_max < MIN_ANCHOR_SEPARATION {
            return Err(ConfigError::DegenerateAnchors);
        }
        Ok(())
    }
}
