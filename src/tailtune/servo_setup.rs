//! On-ground servo setup and feedback calibration
//!
//! Two jobs, both disarmed with the tail tune switch active:
//!
//! 1. **Endpoint adjustment.** A stick gesture picks one servo endpoint
//!    (min, mid or max); the yaw stick then nudges it in real time while the
//!    servo tracks the adjusted value, so the endpoint can be matched to the
//!    mechanical stop by eye.
//! 2. **Feedback calibration.** Pitch-down starts an automatic sequence that
//!    parks the servo at each endpoint and averages the feedback ADC over a
//!    100 ms window, then sweeps min-max repeatedly timing the transits to
//!    derive the servo speed. Anchors closer than
//!    [`MIN_ANCHOR_SEPARATION`] abort the sequence, since that means the
//!    feedback signal is not actually connected.
//!
//! Endpoint writes are live in the working configuration; a save is only
//! requested at the calibration terminals. Deactivating the mode mid-way
//! drops this state without saving (handled by the orchestrator).

use crate::config::{ServoDirection, TailConfig, MIN_ANCHOR_SEPARATION};
use crate::platform::traits::BeeperSignal;

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

use super::{delay_elapsed, TuneContext};

/// Stick deflection that counts as a selection gesture
const GESTURE_THRESHOLD: i16 = 100;

/// Adjustable servo value bounds (pulse units)
const SERVO_VALUE_MIN: f32 = 950.0;
const SERVO_VALUE_MAX: f32 = 2050.0;

/// Servo settle time before an anchor window opens (ms)
const ANCHOR_SETTLE_MS: u32 = 500;

/// Anchor averaging window closes this long after the move (ms)
const ANCHOR_WINDOW_END_MS: u32 = 600;

/// Servo stop time between speed measurement legs (ms)
const SPEED_LEG_PAUSE_MS: u32 = 200;

/// Transit time samples needed for the speed estimate
const SPEED_SAMPLES_NEEDED: u32 = 6;

/// Arrival detection margin on the feedback ADC (raw units)
const ARRIVAL_MARGIN: u32 = 10;

/// Servo endpoint being adjusted or calibrated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoEndpoint {
    Min,
    Mid,
    Max,
}

/// Servo setup sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoSetupState {
    /// Parked, waiting for a gesture
    Idle,
    /// Yaw stick adjusts the selected endpoint
    Adjust,
    /// Automatic feedback calibration running
    Calibrate,
}

/// Feedback calibration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalibPhase {
    /// Not started
    Idle,
    /// Averaging the feedback ADC at each endpoint
    Anchors,
    /// Timing min-max transits
    Speed,
}

/// Automatic calibration sequencer state
#[derive(Debug)]
struct Calibration {
    phase: CalibPhase,
    point: ServoEndpoint,
    timestamp_ms: u32,
    sum: u32,
    count: u32,
    waiting_servo_to_stop: bool,
    done: bool,
}

impl Calibration {
    fn new() -> Self {
        Self {
            phase: CalibPhase::Idle,
            point: ServoEndpoint::Min,
            timestamp_ms: 0,
            sum: 0,
            count: 0,
            waiting_servo_to_stop: false,
            done: false,
        }
    }

    fn reset_window(&mut self, now_ms: u32) {
        self.timestamp_ms = now_ms;
        self.sum = 0;
        self.count = 0;
        self.done = false;
    }
}

/// Interactive servo setup session
#[derive(Debug)]
pub struct ServoSetup {
    state: ServoSetupState,
    /// Servo value to drive while the session is active (pulse units)
    servo_value: f32,
    endpoint: ServoEndpoint,
    cal: Calibration,
}

impl ServoSetup {
    /// Start a session parked at the configured middle
    pub fn new(config: &TailConfig) -> Self {
        Self {
            state: ServoSetupState::Idle,
            servo_value: config.servo.mid as f32,
            endpoint: ServoEndpoint::Mid,
            cal: Calibration::new(),
        }
    }

    pub fn state(&self) -> ServoSetupState {
        self.state
    }

    /// Advance one tick.
    ///
    /// Returns the servo value to drive and whether derived mixer state
    /// must be rebuilt. Live endpoint adjustment does not report a change
    /// per tick; the orchestrator reports one rebuild when the session
    /// ends.
    pub fn update(&mut self, ctx: &mut TuneContext) -> (u16, bool) {
        let mut changed = false;

        self.check_gestures(ctx);

        match self.state {
            ServoSetupState::Idle => {}

            ServoSetupState::Adjust => {
                if !ctx.rc.yaw_within_deadband() {
                    // Yaw stick nudges the selected endpoint; the stick sense
                    // follows the servo direction
                    let sign = match ctx.config.servo_direction {
                        ServoDirection::Normal => -1.0,
                        ServoDirection::Reversed => 1.0,
                    };
                    self.servo_value = (self.servo_value + sign * ctx.rc.yaw as f32 * ctx.dt)
                        .clamp(SERVO_VALUE_MIN, SERVO_VALUE_MAX);

                    // Written live so the working config tracks the stick;
                    // the override drives the servo, so the stale derived
                    // maps are not consulted until the session ends
                    let value = self.servo_value as u16;
                    match self.endpoint {
                        ServoEndpoint::Min => ctx.config.servo.min = value,
                        ServoEndpoint::Mid => ctx.config.servo.mid = value,
                        ServoEndpoint::Max => ctx.config.servo.max = value,
                    }
                }
            }

            ServoSetupState::Calibrate => {
                changed = self.run_calibration(ctx);
            }
        }

        (self.servo_value as u16, changed)
    }

    /// Stick gestures select the adjustment target or start calibration
    fn check_gestures(&mut self, ctx: &mut TuneContext) {
        let roll = ctx.rc.roll;
        let pitch = ctx.rc.pitch;

        if ctx.rc.pitch_within_deadband() && roll < -GESTURE_THRESHOLD {
            // Stick toward min deflection; on a reversed servo that is the
            // max endpoint
            self.endpoint = match ctx.config.servo_direction {
                ServoDirection::Normal => ServoEndpoint::Min,
                ServoDirection::Reversed => ServoEndpoint::Max,
            };
            self.start_adjust(ctx);
            ctx.beeper.beep(BeeperSignal::Confirmation(1));
        } else if ctx.rc.roll_within_deadband() && pitch > GESTURE_THRESHOLD {
            self.endpoint = ServoEndpoint::Mid;
            self.start_adjust(ctx);
            ctx.beeper.beep(BeeperSignal::Confirmation(2));
        } else if ctx.rc.pitch_within_deadband() && roll > GESTURE_THRESHOLD {
            self.endpoint = match ctx.config.servo_direction {
                ServoDirection::Normal => ServoEndpoint::Max,
                ServoDirection::Reversed => ServoEndpoint::Min,
            };
            self.start_adjust(ctx);
            ctx.beeper.beep(BeeperSignal::Confirmation(3));
        } else if ctx.rc.roll_within_deadband() && pitch < -GESTURE_THRESHOLD {
            self.state = ServoSetupState::Calibrate;
            self.cal.phase = CalibPhase::Idle;
        }
    }

    fn start_adjust(&mut self, ctx: &TuneContext) {
        self.servo_value = match self.endpoint {
            ServoEndpoint::Min => ctx.config.servo.min as f32,
            ServoEndpoint::Mid => ctx.config.servo.mid as f32,
            ServoEndpoint::Max => ctx.config.servo.max as f32,
        };
        self.state = ServoSetupState::Adjust;
    }

    /// One tick of the automatic calibration sequence
    fn run_calibration(&mut self, ctx: &mut TuneContext) -> bool {
        let mut changed = false;

        // Phase transitions happen at the tick after a window completes
        if self.cal.done || self.cal.phase == CalibPhase::Idle {
            match self.cal.phase {
                CalibPhase::Idle => {
                    info!("servo setup: feedback calibration started");
                    self.cal.phase = CalibPhase::Anchors;
                    self.cal.point = ServoEndpoint::Min;
                    self.servo_value = ctx.config.servo.min as f32;
                }

                CalibPhase::Speed => {
                    // Speed was the final step; everything measured so far
                    // gets persisted together
                    info!(
                        "servo setup: calibration complete, speed {} deg/s",
                        ctx.config.tail_servo_speed
                    );
                    self.state = ServoSetupState::Idle;
                    self.cal.point = ServoEndpoint::Min;
                    ctx.beeper.beep(BeeperSignal::Ready);
                    ctx.store.request_save();
                    changed = true;
                }

                CalibPhase::Anchors => match self.cal.point {
                    ServoEndpoint::Min => {
                        self.cal.point = ServoEndpoint::Mid;
                        self.servo_value = ctx.config.servo.mid as f32;
                    }
                    ServoEndpoint::Mid => {
                        let spread = ctx.config.servo_min_adc.abs_diff(ctx.config.servo_mid_adc);
                        if spread < MIN_ANCHOR_SEPARATION {
                            // Feedback signal is most likely not connected;
                            // abort but keep what was measured
                            warn!("servo setup: feedback anchors too close, aborting");
                            self.state = ServoSetupState::Idle;
                            self.cal.point = ServoEndpoint::Min;
                            ctx.beeper.beep(BeeperSignal::Fail);
                            ctx.store.request_save();
                            changed = true;
                        } else {
                            self.cal.point = ServoEndpoint::Max;
                            self.servo_value = ctx.config.servo.max as f32;
                        }
                    }
                    ServoEndpoint::Max => {
                        self.cal.phase = CalibPhase::Speed;
                        self.cal.point = ServoEndpoint::Min;
                        self.servo_value = ctx.config.servo.min as f32;
                        self.cal.waiting_servo_to_stop = true;
                    }
                },
            }

            self.cal.reset_window(ctx.now_ms);
        }

        match self.cal.phase {
            CalibPhase::Idle => {}

            CalibPhase::Anchors => {
                // Let the servo settle, then average over a 100 ms window
                if delay_elapsed(ctx.now_ms, self.cal.timestamp_ms, ANCHOR_SETTLE_MS) {
                    if delay_elapsed(ctx.now_ms, self.cal.timestamp_ms, ANCHOR_WINDOW_END_MS)
                        && self.cal.count > 0
                    {
                        let average = (self.cal.sum / self.cal.count) as u16;
                        match self.cal.point {
                            ServoEndpoint::Min => ctx.config.servo_min_adc = average,
                            ServoEndpoint::Mid => ctx.config.servo_mid_adc = average,
                            ServoEndpoint::Max => ctx.config.servo_max_adc = average,
                        }
                        self.cal.done = true;
                        changed = true;
                    } else {
                        self.cal.sum += ctx.feedback_adc as u32;
                        self.cal.count += 1;
                    }
                }
            }

            CalibPhase::Speed => match self.cal.point {
                ServoEndpoint::Min => {
                    // Wait for the servo to reach the min position
                    if (ctx.feedback_adc as u32) < ctx.config.servo_min_adc as u32 + ARRIVAL_MARGIN
                    {
                        if !self.cal.waiting_servo_to_stop {
                            self.cal.sum += ctx.now_ms.wrapping_sub(self.cal.timestamp_ms);
                            self.cal.count += 1;

                            if self.cal.count >= SPEED_SAMPLES_NEEDED {
                                let average_ms = self.cal.sum as f32 / self.cal.count as f32;
                                let full_sweep_deg =
                                    2.0 * ctx.config.servo_angle_at_max as f32 / 10.0;
                                let speed = full_sweep_deg / average_ms * 1000.0;

                                // Keep the persisted speed inside the
                                // validated range
                                ctx.config.tail_servo_speed = (speed as i16).clamp(0, 1000);
                                changed = true;

                                self.cal.done = true;
                                self.servo_value = ctx.config.servo.mid as f32;
                            }

                            self.cal.timestamp_ms = ctx.now_ms;
                            self.cal.waiting_servo_to_stop = true;
                        } else if delay_elapsed(ctx.now_ms, self.cal.timestamp_ms, SPEED_LEG_PAUSE_MS)
                        {
                            // Servo fully stopped; start the next timed leg
                            self.cal.timestamp_ms = ctx.now_ms;
                            self.cal.point = ServoEndpoint::Max;
                            self.cal.waiting_servo_to_stop = false;
                            self.servo_value = ctx.config.servo.max as f32;
                        }
                    }
                }

                ServoEndpoint::Max => {
                    // Wait for the servo to reach the max position
                    if ctx.feedback_adc as u32 + ARRIVAL_MARGIN > ctx.config.servo_max_adc as u32 {
                        if !self.cal.waiting_servo_to_stop {
                            self.cal.sum += ctx.now_ms.wrapping_sub(self.cal.timestamp_ms);
                            self.cal.count += 1;

                            self.cal.timestamp_ms = ctx.now_ms;
                            self.cal.waiting_servo_to_stop = true;
                        } else if delay_elapsed(ctx.now_ms, self.cal.timestamp_ms, SPEED_LEG_PAUSE_MS)
                        {
                            self.cal.timestamp_ms = ctx.now_ms;
                            self.cal.point = ServoEndpoint::Min;
                            self.cal.waiting_servo_to_stop = false;
                            self.servo_value = ctx.config.servo.min as f32;
                        }
                    }
                }

                // Mid is never a speed measurement leg
                ServoEndpoint::Mid => {}
            },
        }

        changed
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
        setup: ServoSetup,
    }

    impl Harness {
        fn new() -> Self {
            let config = TailConfig::default();
            let setup = ServoSetup::new(&config);
            Self {
                config,
                beeper: MockBeeper::new(),
                store: MockConfigStore::new(),
                clock: MockClock::new(),
                setup,
            }
        }

        fn tick(&mut self, rc: RcSticks, feedback_adc: u16) -> (u16, bool) {
            let mut ctx = TuneContext {
                config: &mut self.config,
                beeper: &mut self.beeper,
                store: &mut self.store,
                now_ms: self.clock.now_ms(),
                dt: 0.01,
                armed: false,
                throttle_high: false,
                rc,
                yaw_rate: 0.0,
                feedback_adc,
                servo_angle: 900.0,
                tail_motor_output: 1000,
            };
            self.setup.update(&mut ctx)
        }

        /// Drive the anchor averaging window at one endpoint
        fn run_anchor_window(&mut self, feedback_adc: u16) {
            self.clock.advance_ms(500);
            for _ in 0..10 {
                self.clock.advance_ms(10);
                self.tick(RcSticks::default(), feedback_adc);
            }
            // Window closed, average written on the final tick
        }

        /// One timed transit: travel, arrive, then sit out the stop pause
        /// so the next leg departs
        fn run_speed_leg(&mut self, transit_ms: u32, arrival_adc: u16) -> (u16, bool) {
            self.clock.advance_ms(transit_ms);
            let result = self.tick(RcSticks::default(), arrival_adc);

            self.clock.advance_ms(200);
            self.tick(RcSticks::default(), arrival_adc);
            result
        }
    }

    fn gesture(roll: i16, pitch: i16) -> RcSticks {
        RcSticks {
            roll,
            pitch,
            yaw: 0,
            deadband: 5,
            yaw_deadband: 5,
        }
    }

    fn yaw_stick(yaw: i16) -> RcSticks {
        RcSticks {
            roll: 0,
            pitch: 0,
            yaw,
            deadband: 5,
            yaw_deadband: 5,
        }
    }

    #[test]
    fn test_session_starts_parked_at_middle() {
        let mut harness = Harness::new();
        let (value, changed) = harness.tick(RcSticks::default(), 0);
        assert_eq!(value, 1500);
        assert!(!changed);
        assert_eq!(harness.setup.state(), ServoSetupState::Idle);
    }

    #[test]
    fn test_gestures_select_endpoints() {
        let mut harness = Harness::new();

        let (value, _) = harness.tick(gesture(-200, 0), 0);
        assert_eq!(harness.setup.state(), ServoSetupState::Adjust);
        assert_eq!(value, 1000);
        assert_eq!(harness.beeper.last(), Some(BeeperSignal::Confirmation(1)));

        let (value, _) = harness.tick(gesture(0, 200), 0);
        assert_eq!(value, 1500);
        assert_eq!(harness.beeper.last(), Some(BeeperSignal::Confirmation(2)));

        let (value, _) = harness.tick(gesture(200, 0), 0);
        assert_eq!(value, 2000);
        assert_eq!(harness.beeper.last(), Some(BeeperSignal::Confirmation(3)));
    }

    #[test]
    fn test_reversed_direction_swaps_endpoint_gestures() {
        let mut harness = Harness::new();
        harness.config.servo_direction = crate::config::ServoDirection::Reversed;

        let (value, _) = harness.tick(gesture(-200, 0), 0);
        assert_eq!(value, 2000);
        let (value, _) = harness.tick(gesture(200, 0), 0);
        assert_eq!(value, 1000);
    }

    #[test]
    fn test_yaw_stick_adjusts_selected_endpoint() {
        let mut harness = Harness::new();
        harness.tick(gesture(-200, 0), 0);

        // Normal direction: negative yaw raises the value, 200 * 0.01 per
        // tick. No rebuild is signalled per tick; that happens once when
        // the session ends.
        for _ in 0..10 {
            let (_, changed) = harness.tick(yaw_stick(-200), 0);
            assert!(!changed);
        }
        assert_eq!(harness.config.servo.min, 1020);

        // Centered yaw leaves it alone
        let (value, changed) = harness.tick(yaw_stick(0), 0);
        assert!(!changed);
        assert_eq!(value, 1020);
        assert_eq!(harness.store.save_requests(), 0);
    }

    #[test]
    fn test_adjustment_is_clamped() {
        let mut harness = Harness::new();
        harness.tick(gesture(-200, 0), 0);

        // 1000 units of travel per tick, clamped at the lower bound
        for _ in 0..5 {
            harness.tick(yaw_stick(1000), 0);
        }
        assert_eq!(harness.config.servo.min, 950);
    }

    #[test]
    fn test_anchor_calibration_converges() {
        let mut harness = Harness::new();

        // Pitch-down starts the sequence; servo is sent to min first
        let (value, _) = harness.tick(gesture(0, -200), 1000);
        assert_eq!(harness.setup.state(), ServoSetupState::Calibrate);
        assert_eq!(value, 1000);

        harness.run_anchor_window(1000);
        assert_eq!(harness.config.servo_min_adc, 1000);

        // Next tick moves on to mid
        let (value, _) = harness.tick(RcSticks::default(), 1500);
        assert_eq!(value, 1500);
        harness.run_anchor_window(1500);
        assert_eq!(harness.config.servo_mid_adc, 1500);

        let (value, _) = harness.tick(RcSticks::default(), 2000);
        assert_eq!(value, 2000);
        harness.run_anchor_window(2000);
        assert_eq!(harness.config.servo_max_adc, 2000);

        // Nothing persisted yet; speed calibration saves everything at once
        assert_eq!(harness.store.save_requests(), 0);
        assert!(harness.config.validate_feedback_anchors().is_ok());
    }

    #[test]
    fn test_degenerate_anchors_abort_with_save() {
        let mut harness = Harness::new();
        harness.tick(gesture(0, -200), 1000);

        harness.run_anchor_window(1000);
        // Feedback stuck near the min value: signal not connected
        harness.tick(RcSticks::default(), 1050);
        harness.run_anchor_window(1050);
        assert_eq!(harness.config.servo_mid_adc, 1050);

        harness.tick(RcSticks::default(), 1050);
        assert_eq!(harness.setup.state(), ServoSetupState::Idle);
        assert_eq!(harness.beeper.last(), Some(BeeperSignal::Fail));
        assert_eq!(harness.store.save_requests(), 1);
        // Speed stays at its previous value
        assert_eq!(harness.config.tail_servo_speed, 300);
    }

    #[test]
    fn test_speed_calibration_times_transits() {
        let mut harness = Harness::new();
        harness.tick(gesture(0, -200), 1000);
        harness.run_anchor_window(1000);
        harness.tick(RcSticks::default(), 1500);
        harness.run_anchor_window(1500);
        harness.tick(RcSticks::default(), 2000);
        harness.run_anchor_window(2000);

        // Transition into the speed phase; servo heads back to min
        let (value, _) = harness.tick(RcSticks::default(), 2000);
        assert_eq!(value, 1000);

        // Initial travel to min is not timed
        harness.clock.advance_ms(300);
        harness.tick(RcSticks::default(), 1000);

        // Six timed transits at 300 ms each, alternating max/min arrivals
        for _ in 0..2 {
            harness.run_speed_leg(300, 2000);
            harness.run_speed_leg(300, 1000);
        }
        harness.run_speed_leg(300, 2000);
        let (value, changed) = harness.run_speed_leg(300, 1000);

        // 80 deg full sweep over 300 ms average; servo parks back at mid
        assert!(changed);
        assert_eq!(value, 1500);
        assert_eq!(harness.config.tail_servo_speed, 266);

        // Terminal: ready tone and a single save for the whole sequence
        assert_eq!(harness.setup.state(), ServoSetupState::Idle);
        assert_eq!(harness.beeper.last(), Some(BeeperSignal::Ready));
        assert_eq!(harness.store.save_requests(), 1);
    }

    #[test]
    fn test_speed_measurement_clamps_to_valid_range() {
        let mut harness = Harness::new();
        harness.tick(gesture(0, -200), 1000);
        harness.run_anchor_window(1000);
        harness.tick(RcSticks::default(), 1500);
        harness.run_anchor_window(1500);
        harness.tick(RcSticks::default(), 2000);
        harness.run_anchor_window(2000);
        harness.tick(RcSticks::default(), 2000);
        harness.clock.advance_ms(300);
        harness.tick(RcSticks::default(), 1000);

        // Implausibly fast transits (40 ms for the full sweep) would derive
        // 2000 deg/s; the persisted value stays inside the valid range
        for _ in 0..3 {
            harness.run_speed_leg(40, 2000);
            harness.run_speed_leg(40, 1000);
        }
        assert_eq!(harness.config.tail_servo_speed, 1000);
        assert!(harness.config.validate().is_ok());
    }
}
