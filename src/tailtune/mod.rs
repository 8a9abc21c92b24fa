//! Tail tune calibration state machine
//!
//! Top-level orchestrator for the two mutually exclusive calibration modes:
//!
//! - **Thrust/torque** (armed, in flight): hover hands-off while the mixer
//!   samples the settled tail angle and motor output, then derives the
//!   thrust factor and hover throttle on disarm.
//! - **Servo setup** (disarmed, on the bench): stick gestures select a servo
//!   endpoint to adjust in real time, or start the feedback/speed
//!   calibration sequence. Activating this mode raises an arming lockout so
//!   the craft cannot arm while the tail servo is being driven around.
//!
//! The mode is selected once when the tail tune switch goes active, based on
//! the arm state at that moment. Deactivating the switch at any point drops
//! the session immediately, discarding non-terminal progress; configuration
//! is only ever written (and a save requested) at the terminal transitions
//! inside the sub-machines.

pub mod servo_setup;
pub mod thrust_torque;

pub use servo_setup::{ServoEndpoint, ServoSetup, ServoSetupState};
pub use thrust_torque::{ThrustTorque, ThrustTorqueState};

#[cfg(feature = "defmt")]
use defmt::info;

// Stub macro when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {{}};
}

use crate::config::TailConfig;
use crate::mixer::RcSticks;
use crate::platform::traits::{BeeperInterface, ConfigStore};

/// Wrap-safe deadline check on millisecond timestamps
pub(crate) fn delay_elapsed(now_ms: u32, since_ms: u32, delay_ms: u32) -> bool {
    now_ms.wrapping_sub(since_ms) >= delay_ms
}

/// Everything a tail tune tick needs from the outside world
pub struct TuneContext<'a> {
    pub config: &'a mut TailConfig,
    pub beeper: &'a mut dyn BeeperInterface,
    pub store: &'a mut dyn ConfigStore,
    /// Monotonic milliseconds
    pub now_ms: u32,
    /// Seconds since the previous tick
    pub dt: f32,
    pub armed: bool,
    /// RC throttle held high
    pub throttle_high: bool,
    pub rc: RcSticks,
    /// Yaw body rate (deg/s)
    pub yaw_rate: f32,
    /// Filtered feedback ADC sample
    pub feedback_adc: u16,
    /// Current tail servo angle (decidegrees)
    pub servo_angle: f32,
    /// Commanded tail motor output
    pub tail_motor_output: u16,
}

/// Active calibration session
#[derive(Debug)]
pub enum TailTuneSession {
    /// No calibration in progress
    None,
    /// In-flight thrust/torque measurement
    ThrustTorque(ThrustTorque),
    /// On-ground interactive servo setup
    ServoSetup(ServoSetup),
}

/// Result of one tail tune tick
#[derive(Debug, Default, Clone, Copy)]
pub struct TuneOutput {
    /// Servo value the calibration wants instead of the mixed one
    pub servo_override: Option<u16>,
    /// Configuration was rewritten; derived mixer state must be rebuilt
    pub config_changed: bool,
}

/// Tail tune orchestrator
#[derive(Debug)]
pub struct TailTune {
    session: TailTuneSession,
    active: bool,
    arming_locked: bool,
}

impl Default for TailTune {
    fn default() -> Self {
        Self::new()
    }
}

impl TailTune {
    pub fn new() -> Self {
        Self {
            session: TailTuneSession::None,
            active: false,
            arming_locked: false,
        }
    }

    /// Tail tune flight mode currently engaged
    pub fn active(&self) -> bool {
        self.active
    }

    /// Arming must be blocked (servo setup in progress)
    pub fn arming_locked(&self) -> bool {
        self.arming_locked
    }

    /// Current session, for diagnostics
    pub fn session(&self) -> &TailTuneSession {
        &self.session
    }

    /// Advance the state machine by one tick.
    ///
    /// `mode_switch` is the RC switch assigned to tail tune; dropping it
    /// cancels any in-progress session synchronously.
    pub fn update(&mut self, mode_switch: bool, ctx: &mut TuneContext) -> TuneOutput {
        if !mode_switch {
            if self.active {
                info!("tail tune deactivated");
                self.active = false;
                self.arming_locked = false;
                // Servo setup adjusts endpoints live in the working config
                // without signalling per tick; derived state is rebuilt
                // once here
                let endpoints_touched =
                    matches!(self.session, TailTuneSession::ServoSetup(_));
                self.session = TailTuneSession::None;
                return TuneOutput {
                    servo_override: None,
                    config_changed: endpoints_touched,
                };
            }
            return TuneOutput::default();
        }
        self.active = true;

        // Pick the mode once, from the arm state at activation
        if let TailTuneSession::None = self.session {
            if ctx.armed {
                info!("tail tune: thrust/torque calibration");
                self.session = TailTuneSession::ThrustTorque(ThrustTorque::new());
            } else {
                info!("tail tune: servo setup");
                self.arming_locked = true;
                self.session = TailTuneSession::ServoSetup(ServoSetup::new(ctx.config));
            }
        }

        match &mut self.session {
            TailTuneSession::None => TuneOutput::default(),
            TailTuneSession::ThrustTorque(calibration) => TuneOutput {
                servo_override: None,
                config_changed: calibration.update(ctx),
            },
            TailTuneSession::ServoSetup(setup) => {
                let (servo_value, config_changed) = setup.update(ctx);
                TuneOutput {
                    servo_override: Some(servo_value),
                    config_changed,
                }
            }
        }
    }
}
