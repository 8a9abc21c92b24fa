//! Tail mixer
//!
//! Per-tick driver tying the pieces together. Each control loop iteration:
//!
//! 1. The yaw command is clamped to ±1000 and rescaled by the dynamic yaw
//!    scaler against the estimated tail motor output.
//! 2. The servo position estimate advances, either from the filtered
//!    feedback ADC sample or by simulating the servo against the value
//!    commanded last tick.
//! 3. The command is mapped to a force on the yaw force curve, the curve is
//!    inverted to an angle, and the angle converted to a servo value.
//! 4. The tail tune state machine runs and may override the servo value or
//!    rewrite the configuration (in which case the derived state is
//!    rebuilt).
//! 5. The virtual tail motor advances toward the commanded output.
//!
//! [`TailMixer::motor_correction`] is queried separately per motor and
//! returns the feed-forward throttle correction for the tail motor only.

pub mod actuator;
pub mod conversion;
pub mod correction;
pub mod curve;
pub mod dynamic_yaw;

pub use actuator::{virtual_servo_step, VirtualMotor, FEEDBACK_LPF_CUTOFF_HZ};
pub use conversion::AnchorMap;
pub use correction::CorrectionModel;
pub use curve::{YawForceCurve, TAIL_SERVO_ANGLE_MID, YAW_FORCE_PRECISION};
pub use dynamic_yaw::{DynamicYaw, OutputLimits};

#[cfg(feature = "defmt")]
use defmt::info;

// Stub macro when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {{}};
}

use crate::config::{ConfigError, ServoFeedback, TailConfig};
use crate::libraries::filter::Pt1Filter;
use crate::platform::traits::{BeeperInterface, ClockInterface, ConfigStore};
use crate::tailtune::{TailTune, TuneContext};

/// RC stick commands for the tick, in command units (±500)
#[derive(Debug, Default, Clone, Copy)]
pub struct RcSticks {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    /// Roll/pitch deadband (command units)
    pub deadband: u8,
    /// Yaw deadband (command units)
    pub yaw_deadband: u8,
}

impl RcSticks {
    fn axis_within(command: i16, deadband: u8) -> bool {
        command.saturating_abs().min(500) <= deadband as i16
    }

    pub fn roll_within_deadband(&self) -> bool {
        Self::axis_within(self.roll, self.deadband)
    }

    pub fn pitch_within_deadband(&self) -> bool {
        Self::axis_within(self.pitch, self.deadband)
    }

    pub fn yaw_within_deadband(&self) -> bool {
        Self::axis_within(self.yaw, self.yaw_deadband)
    }
}

/// Everything the mixer samples from the rest of the firmware each tick
#[derive(Debug, Clone, Copy)]
pub struct TickInputs<'a> {
    pub rc: RcSticks,
    pub armed: bool,
    /// RC switch assigned to the tail tune mode
    pub tail_tune_switch: bool,
    /// RC throttle held high
    pub throttle_high: bool,
    /// Yaw body rate (deg/s)
    pub yaw_rate: f32,
    /// Raw feedback ADC sample
    pub feedback_adc: u16,
    /// Commanded motor outputs, indexed by motor
    pub motor_outputs: &'a [u16],
}

/// Tricopter tail mixer
pub struct TailMixer {
    config: TailConfig,
    limits: OutputLimits,

    // Derived from the configuration, rebuilt when a calibration writes it
    curve: YawForceCurve,
    correction: CorrectionModel,
    output_map: AnchorMap,
    feedback_map: AnchorMap,
    iterm_reset_decel_ms: u16,

    dynamic_yaw: DynamicYaw,
    virtual_motor: VirtualMotor,
    feedback_filter: Pt1Filter,
    feedback_adc_filtered: f32,

    /// Servo position estimate (decidegrees)
    servo_angle: f32,
    /// Servo value commanded last tick
    servo_value: u16,

    tail_tune: TailTune,
}

impl TailMixer {
    /// Build the mixer for a validated configuration and the firmware's
    /// motor output limits.
    pub fn new(config: TailConfig, limits: OutputLimits) -> Result<Self, ConfigError> {
        config.validate()?;

        let curve = YawForceCurve::new(config.thrust_factor(), config.servo_angle_at_max);
        let correction = CorrectionModel::new(&config, curve.pitch_zero_angle(), limits.range());
        let output_map =
            AnchorMap::from_servo(&config.servo, config.servo_direction, config.servo_angle_at_max);
        let feedback_map = AnchorMap::from_feedback(&config);

        Ok(Self {
            curve,
            correction,
            output_map,
            feedback_map,
            iterm_reset_decel_ms: Self::iterm_reset_window(&config),
            dynamic_yaw: DynamicYaw::new(limits),
            virtual_motor: VirtualMotor::new(
                limits.range(),
                config.motor_acceleration,
                limits.low as f32,
            ),
            feedback_filter: Pt1Filter::new(),
            feedback_adc_filtered: 0.0,
            servo_angle: TAIL_SERVO_ANGLE_MID as f32,
            servo_value: config.servo.mid,
            tail_tune: TailTune::new(),
            config,
            limits,
        })
    }

    /// One control loop tick: map `yaw_command` (±1000) to the tail servo
    /// value to drive.
    pub fn update(
        &mut self,
        yaw_command: i16,
        dt: f32,
        inputs: &TickInputs,
        clock: &dyn ClockInterface,
        beeper: &mut dyn BeeperInterface,
        store: &mut dyn ConfigStore,
    ) -> u16 {
        // Scale the commanded yaw based on tail motor speed (thrust)
        let scaled = self.dynamic_yaw.scale(
            &self.config,
            yaw_command.clamp(-1000, 1000),
            self.virtual_motor.output(),
        );

        if self.config.servo_feedback != ServoFeedback::Virtual {
            self.feedback_adc_filtered = self.feedback_filter.apply(
                inputs.feedback_adc as f32,
                FEEDBACK_LPF_CUTOFF_HZ,
                dt,
            );
        }

        self.update_servo_angle(dt);

        // Linearize: command -> force -> curve inversion -> servo value
        let force = self.curve.max_yaw_force() * scaled as i32 / YAW_FORCE_PRECISION;
        let angle = self.curve.angle_at_force(force);
        self.servo_value = self.output_map.value_at_angle(angle);

        let tail_motor_output = self.tail_motor_output(inputs);
        let mut ctx = TuneContext {
            config: &mut self.config,
            beeper,
            store,
            now_ms: clock.now_ms(),
            dt,
            armed: inputs.armed,
            throttle_high: inputs.throttle_high,
            rc: inputs.rc,
            yaw_rate: inputs.yaw_rate,
            feedback_adc: self.feedback_adc_filtered as u16,
            servo_angle: self.servo_angle,
            tail_motor_output,
        };
        let tune = self.tail_tune.update(inputs.tail_tune_switch, &mut ctx);

        if let Some(value) = tune.servo_override {
            self.servo_value = value;
        }
        if tune.config_changed {
            self.reinit_derived();
        }

        self.virtual_motor.step(tail_motor_output as f32, dt);

        self.servo_value
    }

    /// Feed-forward throttle correction for `motor_index`; zero for every
    /// motor but the tail one.
    pub fn motor_correction(&self, motor_index: u8) -> i16 {
        if motor_index != self.config.tail_motor_index {
            return 0;
        }

        let setpoint_angle = self.output_map.angle_at_value(self.servo_value as i32);
        self.correction.correction(
            self.servo_angle,
            setpoint_angle,
            self.virtual_motor.output(),
            self.limits.low as i16,
        )
    }

    /// Current servo position estimate (decidegrees)
    pub fn current_servo_angle(&self) -> f32 {
        self.servo_angle
    }

    /// Tail tune flight mode engaged
    pub fn tail_tune_active(&self) -> bool {
        self.tail_tune.active()
    }

    /// Arming must be blocked (servo setup calibration in progress)
    pub fn arming_locked(&self) -> bool {
        self.tail_tune.arming_locked()
    }

    pub fn config(&self) -> &TailConfig {
        &self.config
    }

    /// Yaw I term should be reset once tail motor deceleration has lasted
    /// this long (ms)
    pub fn iterm_reset_deceleration_ms(&self) -> u16 {
        self.iterm_reset_decel_ms
    }

    /// Motor output limits changed (e.g. new throttle configuration)
    pub fn set_output_limits(&mut self, limits: OutputLimits) {
        self.limits = limits;
        self.dynamic_yaw.set_output_limits(limits);
        self.reinit_derived();
    }

    fn update_servo_angle(&mut self, dt: f32) {
        self.servo_angle = if self.config.servo_feedback == ServoFeedback::Virtual {
            // Simulate against the value commanded last tick
            let setpoint = self.output_map.angle_at_value(self.servo_value as i32);
            virtual_servo_step(self.servo_angle, self.config.tail_servo_speed, dt, setpoint)
        } else {
            self.feedback_map
                .angle_at_value(self.feedback_adc_filtered as i32)
        };
    }

    fn tail_motor_output(&self, inputs: &TickInputs) -> u16 {
        inputs
            .motor_outputs
            .get(self.config.tail_motor_index as usize)
            .copied()
            .unwrap_or(self.limits.low)
    }

    /// Rebuild everything derived from the configuration
    fn reinit_derived(&mut self) {
        info!("rebuilding derived mixer state");
        self.curve = YawForceCurve::new(
            self.config.thrust_factor(),
            self.config.servo_angle_at_max,
        );
        self.correction = CorrectionModel::new(
            &self.config,
            self.curve.pitch_zero_angle(),
            self.limits.range(),
        );
        self.output_map = AnchorMap::from_servo(
            &self.config.servo,
            self.config.servo_direction,
            self.config.servo_angle_at_max,
        );
        self.feedback_map = AnchorMap::from_feedback(&self.config);
        self.iterm_reset_decel_ms = Self::iterm_reset_window(&self.config);
        self.virtual_motor
            .set_acceleration(self.limits.range(), self.config.motor_acceleration);
    }

    // Deceleration lasting 35% of the full sweep time means the motor
    // really is spooling down, not just ripple
    fn iterm_reset_window(config: &TailConfig) -> u16 {
        (config.motor_acceleration as f32 * 10.0 * 0.35) as u16
    }
}
