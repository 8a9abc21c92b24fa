//! In-flight thrust/torque calibration
//!
//! While the craft hovers hands-off, the settled tail servo angle is a
//! direct measurement of the thrust/drag ratio: at yaw equilibrium the
//! lateral thrust component cancels the motor torque, so
//! `thrust_factor = cos(a) / sin(a)` for the tilt `a` away from vertical.
//! The mean tail motor output over the same window is the hover throttle
//! reference for the dynamic yaw scaler.
//!
//! The whole sequence runs off repeated per-tick calls; timeouts are
//! deadline checks against the injected clock.

use libm::{cosf, sinf};

#[cfg(feature = "defmt")]
use defmt::{info, warn};

// Stub macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {{}};
}
#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {{}};
}

use crate::platform::traits::BeeperSignal;

use super::{delay_elapsed, TuneContext};

/// Delay between mode entry and measurement, so the pilot can take off if
/// the mode was armed on the ground (ms)
const TAKEOFF_GRACE_MS: u32 = 5000;

/// Sticks must be settled this long before samples count (ms)
const SETTLE_WINDOW_MS: u32 = 250;

/// Sample period while measuring (ms)
const SAMPLE_INTERVAL_MS: u32 = 10;

/// Samples to accumulate before the measurement is complete
const SAMPLES_NEEDED: u16 = 300;

/// Maximum yaw body rate considered "settled" (deg/s)
const MAX_SETTLED_YAW_RATE: f32 = 10.0;

/// Terminal-state reminder tone period (ms)
const REMINDER_TONE_MS: u32 = 2000;

/// Accepted mean servo angle window (degrees)
const MIN_VALID_ANGLE: f32 = 90.5;
const MAX_VALID_ANGLE: f32 = 120.0;

/// Thrust/torque calibration sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThrustTorqueState {
    /// Waiting for throttle to come up
    Idle,
    /// Throttle is up; waiting out the takeoff grace period
    Wait,
    /// Sampling servo angle and motor output
    Active,
    /// Measurement complete; waiting for disarm to evaluate
    WaitForDisarm,
    /// Accepted and persisted
    Done,
    /// Rejected; nothing persisted
    Fail,
}

/// Thrust/torque calibration session state
#[derive(Debug)]
pub struct ThrustTorque {
    state: ThrustTorqueState,
    timestamp_ms: u32,
    last_sample_ms: u32,
    next_beep_delay_ms: u32,
    angle_sum: f32,
    throttle_sum: i32,
    samples: u16,
}

impl ThrustTorque {
    pub fn new() -> Self {
        Self {
            state: ThrustTorqueState::Idle,
            timestamp_ms: 0,
            last_sample_ms: 0,
            next_beep_delay_ms: 0,
            angle_sum: 0.0,
            throttle_sum: 0,
            samples: 0,
        }
    }

    pub fn state(&self) -> ThrustTorqueState {
        self.state
    }

    /// Advance one tick. Returns true when the configuration was rewritten.
    pub fn update(&mut self, ctx: &mut TuneContext) -> bool {
        match self.state {
            ThrustTorqueState::Idle => {
                // Only start once the pilot raises the throttle
                if ctx.throttle_high && ctx.armed {
                    ctx.beeper.beep(BeeperSignal::Waiting);
                    self.next_beep_delay_ms = 1000;
                    self.timestamp_ms = ctx.now_ms;
                    self.last_sample_ms = ctx.now_ms;
                    self.angle_sum = 0.0;
                    self.throttle_sum = 0;
                    self.samples = 0;
                    self.state = ThrustTorqueState::Wait;
                }
                false
            }

            ThrustTorqueState::Wait => {
                if !(ctx.throttle_high && ctx.armed) {
                    self.state = ThrustTorqueState::Idle;
                    return false;
                }
                if delay_elapsed(ctx.now_ms, self.timestamp_ms, TAKEOFF_GRACE_MS) {
                    ctx.beeper.beep(BeeperSignal::Starting);
                    self.state = ThrustTorqueState::Active;
                    self.timestamp_ms = ctx.now_ms;
                } else if delay_elapsed(ctx.now_ms, self.timestamp_ms, self.next_beep_delay_ms) {
                    // Beep every second until measurement starts
                    ctx.beeper.beep(BeeperSignal::Waiting);
                    self.next_beep_delay_ms += 1000;
                }
                false
            }

            ThrustTorqueState::Active => {
                let settled = ctx.throttle_high
                    && ctx.rc.roll_within_deadband()
                    && ctx.rc.pitch_within_deadband()
                    && ctx.rc.yaw_within_deadband()
                    && ctx.yaw_rate.abs() <= MAX_SETTLED_YAW_RATE;

                if !settled {
                    // Restart the settle window
                    self.timestamp_ms = ctx.now_ms;
                    return false;
                }

                if delay_elapsed(ctx.now_ms, self.timestamp_ms, SETTLE_WINDOW_MS)
                    && delay_elapsed(ctx.now_ms, self.last_sample_ms, SAMPLE_INTERVAL_MS)
                {
                    self.last_sample_ms = ctx.now_ms;
                    self.angle_sum += ctx.servo_angle;
                    self.throttle_sum += ctx.tail_motor_output as i32;
                    self.samples += 1;
                    ctx.beeper.beep(BeeperSignal::Confirmation(1));

                    if self.samples >= SAMPLES_NEEDED {
                        ctx.beeper.beep(BeeperSignal::Ready);
                        self.state = ThrustTorqueState::WaitForDisarm;
                        self.timestamp_ms = ctx.now_ms;
                    }
                }
                false
            }

            ThrustTorqueState::WaitForDisarm => {
                if ctx.armed {
                    if delay_elapsed(ctx.now_ms, self.timestamp_ms, REMINDER_TONE_MS) {
                        ctx.beeper.beep(BeeperSignal::Ready);
                        self.timestamp_ms = ctx.now_ms;
                    }
                    return false;
                }

                let mean_angle = self.angle_sum / 10.0 / self.samples as f32;
                self.timestamp_ms = ctx.now_ms;

                if mean_angle > MIN_VALID_ANGLE && mean_angle < MAX_VALID_ANGLE {
                    let tilt = (mean_angle - 90.0).to_radians();
                    // A near-vertical mean angle derives a huge factor;
                    // persisted values must stay inside the validated ranges
                    ctx.config.tail_motor_thrustfactor =
                        ((10.0 * cosf(tilt) / sinf(tilt)) as i16).clamp(10, 400);
                    ctx.config.dynamic_yaw_hoverthrottle =
                        (self.throttle_sum / self.samples as i32).clamp(0, 2000) as i16;
                    ctx.store.request_save();
                    info!(
                        "thrust/torque accepted: thrustfactor {} hoverthrottle {}",
                        ctx.config.tail_motor_thrustfactor, ctx.config.dynamic_yaw_hoverthrottle
                    );
                    self.state = ThrustTorqueState::Done;
                    true
                } else {
                    warn!("thrust/torque rejected: mean angle {} deg", mean_angle);
                    self.state = ThrustTorqueState::Fail;
                    false
                }
            }

            ThrustTorqueState::Done => {
                if delay_elapsed(ctx.now_ms, self.timestamp_ms, REMINDER_TONE_MS) {
                    ctx.beeper.beep(BeeperSignal::Success);
                    self.timestamp_ms = ctx.now_ms;
                }
                false
            }

            ThrustTorqueState::Fail => {
                if delay_elapsed(ctx.now_ms, self.timestamp_ms, REMINDER_TONE_MS) {
                    ctx.beeper.beep(BeeperSignal::Fail);
                    self.timestamp_ms = ctx.now_ms;
                }
                false
            }
        }
    }
}

impl Default for ThrustTorque {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TailConfig;
    use crate::mixer::RcSticks;
    use crate::platform::mock::{MockBeeper, MockClock, MockConfigStore};
    use crate::platform::traits::ClockInterface;

    struct Harness {
        config: TailConfig,
        beeper: MockBeeper,
        store: MockConfigStore,
        clock: MockClock,
        calibration: ThrustTorque,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                config: TailConfig::default(),
                beeper: MockBeeper::new(),
                store: MockConfigStore::new(),
                clock: MockClock::new(),
                calibration: ThrustTorque::new(),
            }
        }

        fn tick(&mut self, armed: bool, throttle_high: bool, servo_angle: f32) -> bool {
            let mut ctx = TuneContext {
                config: &mut self.config,
                beeper: &mut self.beeper,
                store: &mut self.store,
                now_ms: self.clock.now_ms(),
                dt: 0.001,
                armed,
                throttle_high,
                rc: RcSticks {
                    roll: 0,
                    pitch: 0,
                    yaw: 0,
                    deadband: 5,
                    yaw_deadband: 5,
                },
                yaw_rate: 0.0,
                feedback_adc: 0,
                servo_angle,
                tail_motor_output: 1540,
            };
            self.calibration.update(&mut ctx)
        }

        /// Drive through Idle, Wait and Active until measurement completes
        fn run_measurement(&mut self, servo_angle: f32) {
            self.tick(true, true, servo_angle);
            assert_eq!(self.calibration.state(), ThrustTorqueState::Wait);

            self.clock.advance_ms(5000);
            self.tick(true, true, servo_angle);
            assert_eq!(self.calibration.state(), ThrustTorqueState::Active);

            // Settle window plus 300 samples at 10 ms
            self.clock.advance_ms(250);
            for _ in 0..300 {
                self.clock.advance_ms(10);
                self.tick(true, true, servo_angle);
            }
            assert_eq!(self.calibration.state(), ThrustTorqueState::WaitForDisarm);
        }
    }

    #[test]
    fn test_idle_waits_for_high_throttle() {
        let mut harness = Harness::new();
        harness.tick(true, false, 900.0);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Idle);
        harness.tick(false, true, 900.0);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Idle);
        harness.tick(true, true, 900.0);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Wait);
    }

    #[test]
    fn test_wait_beeps_every_second_then_starts() {
        let mut harness = Harness::new();
        harness.tick(true, true, 900.0);
        assert_eq!(harness.beeper.count_of(BeeperSignal::Waiting), 1);

        for _ in 0..4 {
            harness.clock.advance_ms(1000);
            harness.tick(true, true, 900.0);
        }
        assert_eq!(harness.beeper.count_of(BeeperSignal::Waiting), 5);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Wait);

        harness.clock.advance_ms(1000);
        harness.tick(true, true, 900.0);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Active);
        assert_eq!(harness.beeper.count_of(BeeperSignal::Starting), 1);
    }

    #[test]
    fn test_dropping_throttle_in_wait_returns_to_idle() {
        let mut harness = Harness::new();
        harness.tick(true, true, 900.0);
        harness.clock.advance_ms(1000);
        harness.tick(true, false, 900.0);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Idle);
    }

    #[test]
    fn test_accepted_measurement_derives_config() {
        let mut harness = Harness::new();
        // 105 degrees mean angle, 15 degrees of tilt
        harness.run_measurement(1050.0);

        let changed = harness.tick(false, false, 1050.0);
        assert!(changed);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Done);

        // 10 * cos(15deg) / sin(15deg) = 37.32
        assert_eq!(harness.config.tail_motor_thrustfactor, 37);
        assert_eq!(harness.config.dynamic_yaw_hoverthrottle, 1540);
        assert_eq!(harness.store.save_requests(), 1);
    }

    #[test]
    fn test_near_vertical_angle_clamps_thrustfactor() {
        let mut harness = Harness::new();
        // 90.6 degrees is barely inside the accepted window; the raw
        // derivation would be 954, far outside the valid 10..=400
        harness.run_measurement(906.0);

        let changed = harness.tick(false, false, 906.0);
        assert!(changed);
        assert_eq!(harness.config.tail_motor_thrustfactor, 400);
        // The persisted configuration stays buildable
        assert!(harness.config.validate().is_ok());
        assert_eq!(harness.store.save_requests(), 1);
    }

    #[test]
    fn test_out_of_window_angle_fails_without_persisting() {
        let mut harness = Harness::new();
        // 130 degrees mean angle is outside the accepted window
        harness.run_measurement(1300.0);
        // The per-sample confirmation beeps filled the mock's buffer
        harness.beeper.clear();

        let changed = harness.tick(false, false, 1300.0);
        assert!(!changed);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Fail);
        assert_eq!(harness.store.save_requests(), 0);
        assert_eq!(
            harness.config.tail_motor_thrustfactor,
            TailConfig::default().tail_motor_thrustfactor
        );

        // Failure tone repeats until the mode is deactivated
        harness.clock.advance_ms(2000);
        harness.tick(false, false, 1300.0);
        assert_eq!(harness.beeper.count_of(BeeperSignal::Fail), 1);
    }

    #[test]
    fn test_stick_motion_restarts_settle_window() {
        let mut harness = Harness::new();
        harness.tick(true, true, 1050.0);
        harness.clock.advance_ms(5000);
        harness.tick(true, true, 1050.0);
        assert_eq!(harness.calibration.state(), ThrustTorqueState::Active);

        harness.clock.advance_ms(250);

        // A yaw poke resets the window: the next sample needs 250 ms again
        let ctx_rc = RcSticks {
            roll: 0,
            pitch: 0,
            yaw: 200,
            deadband: 5,
            yaw_deadband: 5,
        };
        let mut ctx = TuneContext {
            config: &mut harness.config,
            beeper: &mut harness.beeper,
            store: &mut harness.store,
            now_ms: harness.clock.now_ms(),
            dt: 0.001,
            armed: true,
            throttle_high: true,
            rc: ctx_rc,
            yaw_rate: 0.0,
            feedback_adc: 0,
            servo_angle: 1050.0,
            tail_motor_output: 1540,
        };
        harness.calibration.update(&mut ctx);

        harness.clock.advance_ms(100);
        harness.tick(true, true, 1050.0);
        assert_eq!(harness.calibration.samples, 0);

        harness.clock.advance_ms(150);
        harness.tick(true, true, 1050.0);
        assert_eq!(harness.calibration.samples, 1);
    }
}
